//! # Perm Placement
//!
//! The alternative phi-destruction route: one permutation node per
//! predecessor edge of a phi block. The permutation's inputs are the phi
//! arguments that are not live into the phi block, deduplicated by
//! identity; each input gets an output projection carrying the argument's
//! register, and the phis are rewired to the projections. Live-in arguments
//! interfere with the phi and are left to the duplicate-insertion walker.

use opal_backend_lir::{Function, NodeId};
use rustc_hash::FxHashMap;

use super::{DestructionEnv, PhiLists};
use crate::dump::CHANNEL_SSA_DESTR;

/// Insert a permutation in every predecessor of every block containing
/// phis of the current class
pub(super) fn insert_all_perms(env: &DestructionEnv, function: &mut Function, phis: &PhiLists) {
    for block_id in super::walk_order(function) {
        if phis[block_id].is_empty() {
            continue;
        }

        for pred_index in 0..function.blocks[block_id].preds.len() {
            let pred = function.blocks[block_id].preds[pred_index];

            // Collect the permutation inputs: each distinct argument
            // becomes exactly one input. An argument live into the phi
            // block interferes with the phi and must not be permuted; a
            // copy will be inserted for it later on.
            let mut arg_pos: FxHashMap<NodeId, usize> = FxHashMap::default();
            let mut ins: Vec<NodeId> = Vec::new();
            for &phi in &phis[block_id] {
                let arg = function.node(phi).ins()[pred_index];
                if arg_pos.contains_key(&arg)
                    || env.liveness.is_live_in(function, block_id, arg)
                {
                    continue;
                }
                arg_pos.insert(arg, ins.len());
                ins.push(arg);
            }

            if ins.is_empty() {
                continue;
            }

            let inputs = ins.clone();
            let perm = function.new_perm(pred, ins);
            let mut cursor = function.end_of_block_insertion_point(pred);
            cursor = function.schedule_before(cursor, perm);
            log::debug!(
                target: CHANNEL_SSA_DESTR,
                "perm with {} inputs in bb{} for edge to bb{}",
                inputs.len(),
                pred.index(),
                block_id.index()
            );

            // Make the projections and copy the register assignment from
            // the former phi arguments onto them
            let mut projs = Vec::with_capacity(inputs.len());
            for (pos, &input) in inputs.iter().enumerate() {
                let proj = function.new_proj(perm, pos);
                let reg = function.register_of(input);
                function.set_register(proj, env.class, reg);
                cursor = function.schedule_before(cursor, proj);
                projs.push(proj);
                log::debug!(
                    target: CHANNEL_SSA_DESTR,
                    "register {} moves from %{} to %{}",
                    env.class.reg_name(reg),
                    input.index(),
                    proj.index()
                );
            }

            // Rewire the phis to the projections; arguments missing from
            // the set were interfering (live-in) and stay untouched
            for &phi in &phis[block_id] {
                let arg = function.node(phi).ins()[pred_index];
                if let Some(&pos) = arg_pos.get(&arg) {
                    function.node_mut(phi).ins_mut()[pred_index] = projs[pos];
                    env.liveness.introduce(projs[pos]);
                }
            }

            // the operands' liveness may have changed
            for &input in &inputs {
                env.liveness.update(input);
            }
        }
    }
}
