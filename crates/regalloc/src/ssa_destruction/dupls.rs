//! # Register Assignment and Duplicate Insertion
//!
//! After the permutations are in place, every phi argument must end up in
//! the phi's register. Three cases per `(phi, argument)` pair:
//!
//! - the registers already agree (or the argument's register is a joker or
//!   virtual): pin the argument and move on
//! - the argument interferes with the phi: a duplicate copy in the
//!   argument's block takes the phi's register
//! - otherwise the argument is a projection of the predecessor's
//!   permutation and may be shared between phis with matching registers;
//!   pinning decides who keeps the projection and who duplicates

use opal_backend_lir::{Function, NodeKind};

use super::{DestructionEnv, PhiLists};
use crate::dump::CHANNEL_SSA_DESTR;

/// Adjusts the register allocation for the (new) phi operands and inserts
/// duplicates iff necessary
pub(super) fn set_regs_or_place_dupls(
    env: &DestructionEnv,
    function: &mut Function,
    phis: &PhiLists,
) {
    for block_id in super::walk_order(function) {
        for &phi in &phis[block_id] {
            let phi_reg = function.register_of(phi);
            env.check_supported(phi_reg);
            let n_args = function.node(phi).ins().len();

            for pred_index in 0..n_args {
                let arg = function.node(phi).ins()[pred_index];
                let arg_block = function.blocks[block_id].preds[pred_index];
                let arg_reg = function.register_of(arg);
                env.check_supported(arg_reg);

                log::debug!(
                    target: CHANNEL_SSA_DESTR,
                    "  for %{}({}) -- %{}({})",
                    phi.index(),
                    env.class.reg_name(phi_reg),
                    arg.index(),
                    env.class.reg_name(arg_reg)
                );

                if phi_reg == arg_reg || env.class.kind(arg_reg).is_ignored() {
                    // phi and arg share the register, so pin and continue
                    function.pin(arg, block_id);
                    continue;
                }

                if env.liveness.values_interfere(function, phi, arg) {
                    // insert a duplicate in the argument's block, make it
                    // the new phi arg, give it the phi's register, pin it
                    let dupl = function.new_copy(arg_block, arg);
                    function.node_mut(phi).ins_mut()[pred_index] = dupl;
                    function.set_register(dupl, env.class, phi_reg);
                    let cursor = function.end_of_block_insertion_point(arg_block);
                    function.schedule_before(cursor, dupl);
                    function.pin(dupl, block_id);
                    env.liveness.introduce(dupl);
                    env.liveness.update(arg);
                    log::debug!(
                        target: CHANNEL_SSA_DESTR,
                        "    interference: inserted %{}({})",
                        dupl.index(),
                        env.class.reg_name(phi_reg)
                    );
                    continue;
                }

                // no interference: the argument comes out of the
                // predecessor's permutation
                assert!(
                    function.node(arg).is_proj(),
                    "non-interfering phi argument %{} is not a perm projection",
                    arg.index()
                );

                // look for another phi in this block with the same argument
                // at this position and a register matching the argument; if
                // one exists, the projection is left for that phi
                if !function.is_pinned(arg) {
                    for &other_phi in &phis[block_id] {
                        if function.node(other_phi).ins()[pred_index] == arg
                            && function.register_of(other_phi) == arg_reg
                        {
                            function.pin(arg, block_id);
                            log::debug!(
                                target: CHANNEL_SSA_DESTR,
                                "    projection kept for %{}",
                                other_phi.index()
                            );
                            break;
                        }
                    }
                }

                if function.is_pinned(arg) {
                    // someone else owns the projection: duplicate it behind
                    // the permutation's projections
                    let perm = match &function.node(arg).kind {
                        NodeKind::Proj { perm, .. } => *perm,
                        _ => unreachable!("checked above"),
                    };
                    let dupl = function.new_copy(arg_block, arg);
                    function.node_mut(phi).ins_mut()[pred_index] = dupl;
                    function.set_register(dupl, env.class, phi_reg);

                    // skip the perm's projections and insert behind them
                    let mut cursor = function.cursor_at(perm);
                    cursor.index += 1;
                    while function
                        .cursor_node(cursor)
                        .is_some_and(|n| function.node(n).is_proj())
                    {
                        cursor.index += 1;
                    }
                    function.schedule_before(cursor, dupl);
                    function.pin(dupl, block_id);
                    env.liveness.introduce(dupl);
                    env.liveness.update(arg);
                    log::debug!(
                        target: CHANNEL_SSA_DESTR,
                        "    arg pinned: inserted %{}({})",
                        dupl.index(),
                        env.class.reg_name(phi_reg)
                    );
                } else {
                    // no other phi wants the projection in its register:
                    // just retarget it and pin
                    function.set_register(arg, env.class, phi_reg);
                    function.pin(arg, block_id);
                    log::debug!(
                        target: CHANNEL_SSA_DESTR,
                        "    arg not pinned: now %{}({})",
                        arg.index(),
                        env.class.reg_name(phi_reg)
                    );
                }
            }
        }
    }
}
