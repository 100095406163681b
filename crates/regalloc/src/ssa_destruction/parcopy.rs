//! # Parallel-Copy Planner and Realizer
//!
//! For each `(phi block, predecessor index)` pair the planner translates
//! the phi arguments into a parallel-copy specification over the register
//! file: `parcopy[r]` names the register whose value must end up in `r`
//! (identity means "no move"), and `n_used[r]` counts how often `r` is read
//! as a source. A source that is live into the phi block is counted twice
//! (once for the copy consumer, once for the continuing use) so the realizer
//! never treats it as a one-shot chain end.
//!
//! The realizer decomposes the induced functional graph into fixpoints,
//! chains, forks, and cycles:
//!
//! 1. cycle membership is computed by draining every chain from its dead
//!    end; whatever keeps a non-identity entry is cyclic (an identity entry
//!    with remaining readers is a still-live source and counts as its own
//!    one-element cycle)
//! 2. readers that hang off a cycle are rerouted to a restore copy fed by
//!    the cycle member that receives the wanted value
//! 3. at each fork, the longest downstream chain stays driven directly and
//!    every other reader gets a restore copy from that chain's head
//! 4. the remaining chains are drained into plain copies, dead end first
//! 5. the residual, now only simple cycles, becomes one permutation node
//!    with one projection per rotated register
//! 6. the recorded restore copies are emitted last, reading post-permutation
//!    registers
//!
//! Finally each phi argument is rewired to the node now occupying the phi's
//! register and pinned there.

use opal_backend_lir::{BlockId, Function, NodeId, MAX_REGS};
use smallvec::SmallVec;

use super::{DestructionEnv, PhiLists};
use crate::dump::{DumpFlags, CHANNEL_PARCOPY};

type RegVec<T> = SmallVec<[T; MAX_REGS]>;

/// A parallel-copy specification over one register class
struct ParallelCopy {
    /// `parcopy[r]` = register whose value must end up in `r`
    parcopy: RegVec<usize>,
    /// `n_used[r]` = number of reads of `r` as a source (plus one per
    /// live-in source)
    n_used: RegVec<u32>,
    /// `occupants[r]` = the node whose value currently sits in `r` at the
    /// insertion point; kept current while moves are emitted
    occupants: RegVec<Option<NodeId>>,
}

impl ParallelCopy {
    fn identity(n_regs: usize) -> Self {
        Self {
            parcopy: (0..n_regs).collect(),
            n_used: smallvec::smallvec![0; n_regs],
            occupants: smallvec::smallvec![None; n_regs],
        }
    }

    fn is_identity(&self) -> bool {
        self.parcopy.iter().enumerate().all(|(r, &src)| src == r)
    }
}

/// Route A entry: plan and realize the parallel copy of every predecessor
/// edge of every phi block, then rewire and pin the phi arguments
pub(super) fn analyze_parallel_copies(env: &DestructionEnv, function: &mut Function, phis: &PhiLists) {
    for block_id in super::walk_order(function) {
        if phis[block_id].is_empty() {
            continue;
        }
        for pred_index in 0..function.blocks[block_id].preds.len() {
            let spec = plan_edge(env, function, phis, block_id, pred_index);
            let pred = function.blocks[block_id].preds[pred_index];
            log::debug!(
                target: CHANNEL_PARCOPY,
                "copies for bb{} (edge bb{} -> bb{}):",
                pred.index(),
                pred.index(),
                block_id.index()
            );
            print_parcopy(env, &spec.parcopy, &spec.n_used);
            realize_edge(env, function, phis, block_id, pred_index, pred, spec);
        }
    }
}

/// Translate the phi arguments of one predecessor edge into a
/// parallel-copy specification
fn plan_edge(
    env: &DestructionEnv,
    function: &Function,
    phis: &PhiLists,
    block_id: BlockId,
    pred_index: usize,
) -> ParallelCopy {
    let mut spec = ParallelCopy::identity(env.class.n_regs());

    for &phi in &phis[block_id] {
        let phi_reg = function.register_of(phi);
        let arg = function.node(phi).ins()[pred_index];
        let arg_reg = function.register_of(arg);
        env.check_supported(phi_reg);
        env.check_supported(arg_reg);

        if phi_reg == arg_reg || env.class.kind(arg_reg).is_ignored() {
            continue;
        }

        assert!(
            spec.parcopy[phi_reg] == phi_reg,
            "two phis of bb{} claim register {} for predecessor {}",
            block_id.index(),
            env.class.reg_name(phi_reg),
            pred_index
        );
        spec.parcopy[phi_reg] = arg_reg;
        spec.n_used[arg_reg] += 1;
        spec.occupants[arg_reg] = Some(arg);
        log::debug!(
            target: CHANNEL_PARCOPY,
            "copy {} -> {}",
            env.class.reg_name(arg_reg),
            env.class.reg_name(phi_reg)
        );

        // a live-in source stays in use after the copy and must not be
        // treated as a one-shot chain end
        if env.liveness.is_live_in(function, block_id, arg) {
            spec.n_used[arg_reg] += 1;
        }
    }

    spec
}

/// Emit the move sequence for one edge and rewire the phi arguments
fn realize_edge(
    env: &DestructionEnv,
    function: &mut Function,
    phis: &PhiLists,
    block_id: BlockId,
    pred_index: usize,
    pred: BlockId,
    mut spec: ParallelCopy,
) {
    let n_regs = env.class.n_regs();
    let mut restores: Vec<(usize, usize)> = Vec::new();

    if !spec.is_identity() {
        // Phase 1: cycle membership
        let in_cycle = mark_cycle_parts(&spec.parcopy, &spec.n_used);

        // Phase 2: out-of-cycle propagations
        for to_reg in 0..n_regs {
            let from_reg = spec.parcopy[to_reg];
            if from_reg == to_reg {
                continue;
            }
            if in_cycle[from_reg] && !in_cycle[to_reg] {
                log::debug!(
                    target: CHANNEL_PARCOPY,
                    "out-of-cycle propagation {} -> {}",
                    env.class.reg_name(from_reg),
                    env.class.reg_name(to_reg)
                );
                let new_src = (0..n_regs)
                    .find(|&src| spec.parcopy[src] == from_reg && in_cycle[src])
                    .unwrap_or_else(|| {
                        panic!(
                            "no unambiguous source for out-of-cycle propagation into {}",
                            env.class.reg_name(to_reg)
                        )
                    });
                restores.push((new_src, to_reg));
                spec.n_used[from_reg] -= 1;
                spec.parcopy[to_reg] = to_reg;
            }
        }

        // Phase 3: fork linearization
        for to_reg in 0..n_regs {
            if spec.parcopy[to_reg] == to_reg || spec.n_used[to_reg] > 0 {
                continue;
            }
            // found the end of a chain, follow it
            let mut r = to_reg;
            while r != spec.parcopy[r] {
                r = spec.parcopy[r];
                if spec.n_used[r] > 1 {
                    let longest_next = find_longest_chain(env, &spec.parcopy, &spec.n_used, r);
                    log::debug!(
                        target: CHANNEL_PARCOPY,
                        "fork at {}, longest chain via {}",
                        env.class.reg_name(r),
                        env.class.reg_name(longest_next)
                    );
                    assert!(
                        longest_next != r,
                        "longest chain from fork {} leads back to itself",
                        env.class.reg_name(r)
                    );
                    for dst in 0..n_regs {
                        if dst != longest_next && dst != r && spec.parcopy[dst] == r {
                            restores.push((longest_next, dst));
                            spec.n_used[r] -= 1;
                            spec.parcopy[dst] = dst;
                        }
                    }
                }
            }
        }

        let mut cursor = function.end_of_block_insertion_point(pred);

        // Phase 4: drain the remaining chains into plain copies, dead end
        // first so no source is clobbered before it is read
        for to_reg in 0..n_regs {
            if spec.parcopy[to_reg] == to_reg || spec.n_used[to_reg] > 0 {
                continue;
            }
            let mut s = to_reg;
            while spec.n_used[s] == 0 && spec.parcopy[s] != s {
                let src = spec.parcopy[s];
                let value = spec.occupants[src].unwrap_or_else(|| {
                    panic!("source register {} has no occupant", env.class.reg_name(src))
                });
                let copy = function.new_copy(pred, value);
                function.set_register(copy, env.class, s);
                cursor = function.schedule_before(cursor, copy);
                env.liveness.introduce(copy);
                env.liveness.update(value);
                spec.occupants[s] = Some(copy);
                spec.parcopy[s] = s;
                spec.n_used[src] -= 1;
                s = src;
            }
        }

        // Phase 5: the residual is now simple cycles only; lower it to one
        // permutation node with a projection per rotated register
        let mut perm_ins: Vec<NodeId> = Vec::new();
        let mut perm_dsts: RegVec<usize> = SmallVec::new();
        for r in 0..n_regs {
            let src = spec.parcopy[r];
            if src != r {
                assert!(
                    spec.n_used[src] == 1,
                    "residual entry {} -> {} is neither fixpoint nor simple cycle",
                    env.class.reg_name(src),
                    env.class.reg_name(r)
                );
                perm_ins.push(spec.occupants[src].unwrap_or_else(|| {
                    panic!("cycle register {} has no occupant", env.class.reg_name(src))
                }));
                perm_dsts.push(r);
            }
        }
        if !perm_ins.is_empty() {
            log::debug!(
                target: CHANNEL_PARCOPY,
                "lowering residual cycles to a perm of {} registers",
                perm_ins.len()
            );
            let inputs = perm_ins.clone();
            let perm = function.new_perm(pred, perm_ins);
            cursor = function.schedule_before(cursor, perm);
            for (pos, &dst) in perm_dsts.iter().enumerate() {
                let proj = function.new_proj(perm, pos);
                function.set_register(proj, env.class, dst);
                cursor = function.schedule_before(cursor, proj);
                env.liveness.introduce(proj);
                env.liveness.update(inputs[pos]);
                spec.occupants[dst] = Some(proj);
                spec.parcopy[dst] = dst;
            }
        }

        for r in 0..n_regs {
            assert!(
                spec.parcopy[r] == r,
                "register {} still demands a value after realization",
                env.class.reg_name(r)
            );
        }

        // Phase 6: restore copies, reading post-permutation registers
        for &(src_reg, dst_reg) in &restores {
            let value = spec.occupants[src_reg].unwrap_or_else(|| {
                panic!(
                    "restore source {} has no occupant",
                    env.class.reg_name(src_reg)
                )
            });
            let copy = function.new_copy(pred, value);
            function.set_register(copy, env.class, dst_reg);
            cursor = function.schedule_before(cursor, copy);
            env.liveness.introduce(copy);
            env.liveness.update(value);
            spec.occupants[dst_reg] = Some(copy);
            log::debug!(
                target: CHANNEL_PARCOPY,
                "restore copy {} -> {}",
                env.class.reg_name(src_reg),
                env.class.reg_name(dst_reg)
            );
        }
    }

    // Rewire each phi argument to the node now holding its value in the
    // phi's register, and pin it there
    for &phi in &phis[block_id] {
        let phi_reg = function.register_of(phi);
        let arg = function.node(phi).ins()[pred_index];
        let arg_reg = function.register_of(arg);

        if phi_reg == arg_reg || env.class.kind(arg_reg).is_ignored() {
            function.pin(arg, block_id);
            continue;
        }

        let new_arg = spec.occupants[phi_reg].unwrap_or_else(|| {
            panic!(
                "parallel copy left phi register {} unoccupied",
                env.class.reg_name(phi_reg)
            )
        });
        function.node_mut(phi).ins_mut()[pred_index] = new_arg;
        function.pin(new_arg, block_id);
    }
}

/// Computes which registers of the specification belong to a cycle.
///
/// Every chain is drained from its dead end on scratch copies; what keeps a
/// non-identity entry afterwards is cyclic. An identity entry with
/// remaining readers is a still-live source and is marked cyclic as well,
/// so its readers are served by restore copies.
fn mark_cycle_parts(parcopy: &[usize], n_used: &[u32]) -> RegVec<bool> {
    let n_regs = parcopy.len();
    let mut parcopy: RegVec<usize> = SmallVec::from_slice(parcopy);
    let mut n_used: RegVec<u32> = SmallVec::from_slice(n_used);
    let mut in_cycle: RegVec<bool> = smallvec::smallvec![false; n_regs];

    for r in 0..n_regs {
        if parcopy[r] == r || n_used[r] > 0 {
            continue;
        }

        // end of a chain: drain it
        let mut s = r;
        while n_used[s] == 0 && parcopy[s] != s {
            let src = parcopy[s];
            parcopy[s] = s;
            assert!(n_used[src] > 0);
            n_used[src] -= 1;
            s = src;
        }
    }

    // only cycles left
    for r in 0..n_regs {
        if parcopy[r] == r {
            if n_used[r] > 0 {
                in_cycle[r] = true;
            }
            continue;
        }

        assert!(n_used[r] == 1);
        let mut s = r;
        while parcopy[s] != s {
            in_cycle[s] = true;
            let src = parcopy[s];
            parcopy[s] = s;
            s = src;
        }
    }

    in_cycle
}

/// Finds the destination through which the longest chain hanging off
/// `fork_reg` runs, measured in demands satisfied. Ties break toward the
/// lower-numbered register.
fn find_longest_chain(
    env: &DestructionEnv,
    parcopy: &[usize],
    n_used: &[u32],
    fork_reg: usize,
) -> usize {
    assert!(n_used[fork_reg] > 1, "not a fork");
    let n_regs = parcopy.len();

    let mut max_len = 0usize;
    let mut max_dst = None;

    for to_reg in 0..n_regs {
        if parcopy[to_reg] == to_reg || n_used[to_reg] > 0 {
            continue;
        }

        let mut r = to_reg;
        let mut len = 0usize;
        while r != parcopy[r] {
            let src = parcopy[r];
            len += 1;
            if src == fork_reg {
                if len > max_len {
                    max_len = len;
                    max_dst = Some(r);
                }
                break;
            }
            r = src;
        }
    }

    max_dst.unwrap_or_else(|| {
        panic!(
            "no chain hangs off fork {}",
            env.class.reg_name(fork_reg)
        )
    })
}

/// Chain/cycle dump of a specification, gated by `PARCOPY_CHAINS`
fn print_parcopy(env: &DestructionEnv, parcopy: &[usize], n_used: &[u32]) {
    if !env.options.dump_flags.contains(DumpFlags::PARCOPY_CHAINS) {
        return;
    }
    let n_regs = parcopy.len();
    let mut parcopy: RegVec<usize> = SmallVec::from_slice(parcopy);
    let mut n_used_scratch: RegVec<u32> = SmallVec::from_slice(n_used);

    for r in 0..n_regs {
        if n_used[r] != 0 {
            log::debug!(
                target: CHANNEL_PARCOPY,
                "#users[{}({})] = {}",
                env.class.reg_name(r),
                r,
                n_used[r]
            );
        }
    }

    for r in 0..n_regs {
        if parcopy[r] == r || n_used_scratch[r] > 0 {
            continue;
        }

        // end of a chain; collect it and print source-first
        let mut component = vec![r];
        let mut s = r;
        while n_used_scratch[s] == 0 && parcopy[s] != s {
            let src = parcopy[s];
            parcopy[s] = s;
            n_used_scratch[src] -= 1;
            component.push(src);
            s = src;
        }
        component.reverse();
        let rendered = component
            .iter()
            .map(|&c| format!("{}({})", env.class.reg_name(c), c))
            .collect::<Vec<_>>()
            .join(" -> ");
        log::debug!(target: CHANNEL_PARCOPY, "chain {rendered}");
    }

    for r in 0..n_regs {
        if parcopy[r] == r {
            continue;
        }

        let mut component = Vec::new();
        let mut s = r;
        while parcopy[s] != s {
            component.push(s);
            let src = parcopy[s];
            parcopy[s] = s;
            s = src;
        }
        component.reverse();
        let rendered = component
            .iter()
            .map(|&c| format!("{}({})", env.class.reg_name(c), c))
            .collect::<Vec<_>>()
            .join(" -> ");
        log::debug!(target: CHANNEL_PARCOPY, "cycle {rendered} -> back");
    }
}

#[cfg(test)]
#[path = "parcopy_tests.rs"]
mod tests;
