//! # Liveness Oracle
//!
//! Per-block live-in/live-out sets plus the interference query the
//! register-level passes rely on. The sets are recomputed lazily: passes
//! call `invalidate`/`introduce`/`update` after structural edits, and the
//! next query rebuilds the sets from a backward dataflow fixpoint.
//!
//! Phi semantics: a phi argument is live out of the matching predecessor,
//! not live into the phi's block. The phi itself is defined at the head of
//! its block.

use std::cell::RefCell;

use index_vec::IndexVec;
use rustc_hash::FxHashSet;

use crate::{BlockId, Function, NodeId};

/// The lazily recomputed liveness oracle
#[derive(Debug, Default)]
pub struct Liveness {
    cache: RefCell<Option<LiveSets>>,
}

#[derive(Debug)]
struct LiveSets {
    live_in: IndexVec<BlockId, FxHashSet<NodeId>>,
    live_out: IndexVec<BlockId, FxHashSet<NodeId>>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the cached sets; the next query recomputes them
    pub fn invalidate(&self) {
        *self.cache.borrow_mut() = None;
    }

    /// Records that `value` is a new node the sets must account for
    pub fn introduce(&self, value: NodeId) {
        log::trace!(target: "opal::liveness", "introduce %{}", value.index());
        self.invalidate();
    }

    /// Records that the uses of `value` changed
    pub fn update(&self, value: NodeId) {
        log::trace!(target: "opal::liveness", "update %{}", value.index());
        self.invalidate();
    }

    /// Is `value` live at the entry of `block`?
    pub fn is_live_in(&self, function: &Function, block: BlockId, value: NodeId) -> bool {
        self.with_sets(function, |sets| sets.live_in[block].contains(&value))
    }

    /// Is `value` live at the exit of `block`?
    pub fn is_live_out(&self, function: &Function, block: BlockId, value: NodeId) -> bool {
        self.with_sets(function, |sets| sets.live_out[block].contains(&value))
    }

    /// Do the live ranges of `a` and `b` overlap?
    ///
    /// Two values interfere iff one is live just after the other's
    /// definition point.
    pub fn values_interfere(&self, function: &Function, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        self.with_sets(function, |sets| {
            sets.live_at_def(function, a, b) || sets.live_at_def(function, b, a)
        })
    }

    fn with_sets<R>(&self, function: &Function, f: impl FnOnce(&LiveSets) -> R) -> R {
        let mut cache = self.cache.borrow_mut();
        if cache.is_none() {
            *cache = Some(LiveSets::compute(function));
        }
        f(cache.as_ref().unwrap())
    }
}

impl LiveSets {
    /// Backward dataflow fixpoint over the CFG
    fn compute(function: &Function) -> Self {
        let n_blocks = function.blocks.len();
        let mut live_in: IndexVec<BlockId, FxHashSet<NodeId>> =
            index_vec::index_vec![FxHashSet::default(); n_blocks];
        let mut live_out: IndexVec<BlockId, FxHashSet<NodeId>> =
            index_vec::index_vec![FxHashSet::default(); n_blocks];

        let order = crate::cfg::postorder(function);

        let mut changed = true;
        while changed {
            changed = false;

            for &block_id in &order {
                // live_out = union over successors of their live-in plus
                // the phi arguments flowing along this edge
                let mut new_out = FxHashSet::default();
                for succ in crate::cfg::successors(function, block_id) {
                    new_out.extend(live_in[succ].iter().copied());
                    for (pos, &pred) in function.blocks[succ].preds.iter().enumerate() {
                        if pred != block_id {
                            continue;
                        }
                        for &phi in &function.phis_of(succ) {
                            if let crate::NodeKind::Phi { args } = &function.nodes[phi].kind {
                                new_out.insert(args[pos]);
                            }
                        }
                    }
                }

                // live_in = (live_out minus defs) plus upward-exposed uses,
                // scanning backward from the terminator
                let mut new_in = new_out.clone();
                new_in.extend(
                    function.blocks[block_id]
                        .terminator
                        .used_nodes()
                        .iter()
                        .copied(),
                );
                for &node in function.blocks[block_id].schedule.iter().rev() {
                    new_in.remove(&node);
                    if !function.nodes[node].is_phi() {
                        new_in.extend(function.nodes[node].ins().iter().copied());
                    }
                }

                if new_out != live_out[block_id] {
                    live_out[block_id] = new_out;
                    changed = true;
                }
                if new_in != live_in[block_id] {
                    live_in[block_id] = new_in;
                    changed = true;
                }
            }
        }

        Self { live_in, live_out }
    }

    /// Is `y` live just after the definition of `x`?
    fn live_at_def(&self, function: &Function, x: NodeId, y: NodeId) -> bool {
        let block = function.nodes[x].block;
        let schedule = &function.blocks[block].schedule;
        let Some(pos_x) = function.blocks[block].schedule_position(x) else {
            // x is not scheduled (yet); treat its definition as the block end
            return self.live_out[block].contains(&y);
        };

        // y's live range must have started by x's definition
        let started = if function.nodes[y].block == block {
            match function.blocks[block].schedule_position(y) {
                Some(pos_y) => pos_y < pos_x,
                None => false,
            }
        } else {
            self.live_in[block].contains(&y)
        };
        if !started {
            return false;
        }

        if self.live_out[block].contains(&y) {
            return true;
        }

        // otherwise y must be read by something after x in this block
        for &node in schedule.iter().skip(pos_x + 1) {
            if !function.nodes[node].is_phi() && function.nodes[node].ins().contains(&y) {
                return true;
            }
        }
        function.blocks[block].terminator.used_nodes().contains(&y)
    }
}
