//! Test helpers: function builders and a symbolic register-file simulator.
//!
//! The simulator executes a block's schedule with machine semantics: every
//! move reads the register its operand is *assigned to* at that point, not
//! the SSA value, so any read-after-clobber hazard the destruction passes
//! might introduce shows up as a wrong final register file.

use opal_backend_lir::{BlockId, Function, NodeId, NodeKind, RegisterClass, Terminator};
use rustc_hash::FxHashMap;

/// Register index -> token (node id) of the value currently held
pub(crate) type RegFile = FxHashMap<usize, NodeId>;

/// Executes `block`'s schedule starting from `regs`
pub(crate) fn run_block(function: &Function, block: BlockId, mut regs: RegFile) -> RegFile {
    let mut perm_reads: FxHashMap<NodeId, Vec<Option<NodeId>>> = FxHashMap::default();

    for &id in &function.blocks[block].schedule {
        let node = function.node(id);
        match &node.kind {
            NodeKind::Op { .. } => {
                // an op produces a fresh value, named by its node id
                if let Some(reg) = node.register {
                    regs.insert(reg, id);
                }
            }
            NodeKind::Copy { src } => {
                let value = regs.get(&function.register_of(*src)).copied();
                let dst = function.register_of(id);
                match value {
                    Some(value) => {
                        regs.insert(dst, value);
                    }
                    None => {
                        regs.remove(&dst);
                    }
                }
            }
            NodeKind::Perm { ins } => {
                // atomic: all inputs are read before any projection writes
                let reads = ins
                    .iter()
                    .map(|&input| regs.get(&function.register_of(input)).copied())
                    .collect();
                perm_reads.insert(id, reads);
            }
            NodeKind::Proj { perm, pos } => {
                let value = perm_reads[perm][*pos];
                let dst = function.register_of(id);
                match value {
                    Some(value) => {
                        regs.insert(dst, value);
                    }
                    None => {
                        regs.remove(&dst);
                    }
                }
            }
            NodeKind::Phi { .. } | NodeKind::RegIn => {}
        }
    }

    regs
}

/// Counts scheduled nodes of `block` matching `pred`
pub(crate) fn count_in_schedule(
    function: &Function,
    block: BlockId,
    pred: impl Fn(&NodeKind) -> bool,
) -> usize {
    function.blocks[block]
        .schedule
        .iter()
        .filter(|&&id| pred(&function.node(id).kind))
        .count()
}

pub(crate) fn is_copy(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Copy { .. })
}

pub(crate) fn is_perm(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Perm { .. })
}

/// A two-block function: the entry block defines one argument per distinct
/// source register and jumps to a merge block holding one phi per demand.
///
/// `demands` are `(phi_register, argument_register)` pairs;
/// `live_in_sources` lists argument registers that must stay live into the
/// merge block (a keep op is added there for each).
///
/// Returns the function, the predecessor block, the argument node per
/// source register, and the `(phi_register, original argument)`
/// expectations.
pub(crate) struct EdgeScenario {
    pub function: Function,
    pub pred: BlockId,
    pub arg_of: FxHashMap<usize, NodeId>,
    pub expectations: Vec<(usize, NodeId)>,
}

pub(crate) fn edge_scenario(
    class: &RegisterClass,
    demands: &[(usize, usize)],
    live_in_sources: &[usize],
) -> EdgeScenario {
    let mut function = Function::new("scenario");
    let pred = function.entry_block;
    let merge = function.add_block();

    let mut arg_of: FxHashMap<usize, NodeId> = FxHashMap::default();
    for &(_, src) in demands {
        if !arg_of.contains_key(&src) {
            let arg = function.new_op(pred, format!("def_r{src}"), vec![], false);
            function.set_register(arg, class, src);
            arg_of.insert(src, arg);
        }
    }

    function.blocks[pred].set_terminator(Terminator::jump(merge));
    function.connect(pred, merge);

    let mut expectations = Vec::new();
    for &(dst, src) in demands {
        let arg = arg_of[&src];
        let phi = function.new_phi(merge, vec![arg]);
        function.set_register(phi, class, dst);
        expectations.push((dst, arg));
    }

    for &src in live_in_sources {
        let arg = arg_of[&src];
        function.new_op(merge, "keep", vec![arg], false);
    }

    function.blocks[merge].set_terminator(Terminator::return_values(vec![]));

    EdgeScenario {
        function,
        pred,
        arg_of,
        expectations,
    }
}
