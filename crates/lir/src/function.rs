//! # LIR Function
//!
//! A function owns the node arena and the CFG of basic blocks, plus the
//! side tables the register-level passes need: the pinning table written by
//! SSA destruction and read by its post-condition check.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::{
    indent_str, Block, BlockId, LirError, LirResult, Node, NodeId, NodeKind, PrettyPrint,
};

/// The LIR for a single procedure, laid out as a Control Flow Graph
///
/// # Design Notes
///
/// - Nodes live in an arena and are never deleted; passes unschedule or
///   rewrite them in place so `NodeId`s stay stable
/// - The pinning table is a per-function map keyed by node identity, not a
///   flag aliased onto the node itself: several passes can reset it without
///   racing over a shared link slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// The name of the procedure (for debugging and diagnostics)
    pub name: String,

    /// All basic blocks in this function, forming the CFG
    pub blocks: IndexVec<BlockId, Block>,

    /// The node arena
    pub nodes: IndexVec<NodeId, Node>,

    /// The entry point of the function
    pub entry_block: BlockId,

    /// Values pinned to a block: the value has received its final register
    /// there and must not be rewritten by other phis
    pinned: FxHashMap<NodeId, BlockId>,
}

impl Function {
    /// Creates a new function with a single empty entry block
    pub fn new(name: impl Into<String>) -> Self {
        let mut blocks = IndexVec::new();
        let entry_block = blocks.push(Block::new());

        Self {
            name: name.into(),
            blocks,
            nodes: IndexVec::new(),
            entry_block,
            pinned: FxHashMap::default(),
        }
    }

    /// Adds a new basic block and returns its ID
    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    /// Records a CFG edge: `succ` gains `pred` as its next predecessor
    pub fn connect(&mut self, pred: BlockId, succ: BlockId) {
        self.blocks[succ].add_pred(pred);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Register index of `id`, panicking with a diagnostic if unset
    pub fn register_of(&self, id: NodeId) -> usize {
        self.nodes[id]
            .register
            .unwrap_or_else(|| panic!("node %{} has no register assigned", id.index()))
    }

    /// Assigns `register` (an index into `class`) to `id`
    pub fn set_register(&mut self, id: NodeId, class: &crate::RegisterClass, register: usize) {
        self.nodes[id].register = Some(register);
        self.nodes[id].reg_class = Some(class.name().to_owned());
    }

    /// Does `id` carry a register of `class`?
    pub fn node_has_class(&self, id: NodeId, class: &crate::RegisterClass) -> bool {
        self.nodes[id].reg_class.as_deref() == Some(class.name())
    }

    // --- Node factories ---

    /// Creates a node without scheduling it
    pub fn new_node(&mut self, kind: NodeKind, block: BlockId) -> NodeId {
        self.nodes.push(Node::new(kind, block))
    }

    /// Creates an opaque target instruction and appends it to `block`
    pub fn new_op(
        &mut self,
        block: BlockId,
        name: impl Into<String>,
        ins: Vec<NodeId>,
        control_flow: bool,
    ) -> NodeId {
        let id = self.new_node(
            NodeKind::Op {
                name: name.into(),
                ins,
                control_flow,
            },
            block,
        );
        self.blocks[block].schedule.push(id);
        id
    }

    /// Creates a phi at the head of `block` (after any existing phis)
    pub fn new_phi(&mut self, block: BlockId, args: Vec<NodeId>) -> NodeId {
        let id = self.new_node(NodeKind::Phi { args }, block);
        let insert_pos = self.blocks[block]
            .schedule
            .iter()
            .position(|&n| !self.nodes[n].is_phi())
            .unwrap_or(self.blocks[block].schedule.len());
        self.blocks[block].schedule.insert(insert_pos, id);
        id
    }

    /// Creates an unscheduled copy of `src`, recording the copy origin
    pub fn new_copy(&mut self, block: BlockId, src: NodeId) -> NodeId {
        let id = self.new_node(NodeKind::Copy { src }, block);
        self.nodes[id].copy_of = Some(src);
        id
    }

    /// Creates an unscheduled permutation node over `ins`
    pub fn new_perm(&mut self, block: BlockId, ins: Vec<NodeId>) -> NodeId {
        self.new_node(NodeKind::Perm { ins }, block)
    }

    /// Creates an unscheduled projection of `perm`'s `pos`-th input,
    /// recording the projected value as the copy origin
    pub fn new_proj(&mut self, perm: NodeId, pos: usize) -> NodeId {
        let block = self.nodes[perm].block;
        let origin = match &self.nodes[perm].kind {
            NodeKind::Perm { ins } => ins[pos],
            _ => panic!("new_proj on non-perm node %{}", perm.index()),
        };
        let id = self.new_node(NodeKind::Proj { perm, pos }, block);
        self.nodes[id].copy_of = Some(origin);
        id
    }

    // --- Pinning ---

    /// Pins `node` to `block`: it has its final register there and must not
    /// be rewritten by other phis
    pub fn pin(&mut self, node: NodeId, block: BlockId) {
        self.pinned.insert(node, block);
    }

    pub fn is_pinned(&self, node: NodeId) -> bool {
        self.pinned.contains_key(&node)
    }

    pub fn pinning_block(&self, node: NodeId) -> Option<BlockId> {
        self.pinned.get(&node).copied()
    }

    /// Drops all pinning marks (each `destroy_ssa` invocation starts fresh)
    pub fn clear_pins(&mut self) {
        self.pinned.clear();
    }

    // --- Queries ---

    /// Returns an iterator over all basic blocks
    pub fn block_iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter_enumerated()
    }

    /// The phi nodes at the head of `block`'s schedule.
    ///
    /// `RegIn` markers count as part of the head region: destruction of one
    /// register class leaves them interleaved with the phis of the others.
    pub fn phis_of(&self, block: BlockId) -> Vec<NodeId> {
        self.blocks[block]
            .schedule
            .iter()
            .copied()
            .take_while(|&n| {
                matches!(self.nodes[n].kind, NodeKind::Phi { .. } | NodeKind::RegIn)
            })
            .filter(|&n| self.nodes[n].is_phi())
            .collect()
    }

    /// Validates the function structure
    ///
    /// Checks terminator targets, schedule/block consistency, phi arity
    /// against the predecessor list, phi placement, and proj placement.
    pub fn validate(&self) -> LirResult<()> {
        for (block_id, block) in self.block_iter() {
            for target in block.terminator.target_blocks() {
                if self.blocks.get(target).is_none() {
                    return Err(LirError::ValidationError {
                        message: format!("terminator targets non-existent block {target:?}"),
                        block_id: Some(block_id),
                    });
                }
                if !self.blocks[target].preds.contains(&block_id) {
                    return Err(LirError::ValidationError {
                        message: format!(
                            "edge to bb{} not recorded in its predecessor list",
                            target.index()
                        ),
                        block_id: Some(block_id),
                    });
                }
            }

            let mut seen_body = false;
            let mut seen_control_flow = false;
            for &id in &block.schedule {
                let node = &self.nodes[id];
                if node.block != block_id {
                    return Err(LirError::ValidationError {
                        message: format!(
                            "node %{} scheduled here but owned by bb{}",
                            id.index(),
                            node.block.index()
                        ),
                        block_id: Some(block_id),
                    });
                }
                if node.is_phi() {
                    if seen_body {
                        return Err(LirError::ValidationError {
                            message: format!("phi %{} not at block head", id.index()),
                            block_id: Some(block_id),
                        });
                    }
                    if let NodeKind::Phi { args } = &node.kind {
                        if args.len() != block.preds.len() {
                            return Err(LirError::ValidationError {
                                message: format!(
                                    "phi %{} has {} args for {} predecessors",
                                    id.index(),
                                    args.len(),
                                    block.preds.len()
                                ),
                                block_id: Some(block_id),
                            });
                        }
                    }
                } else if !matches!(node.kind, NodeKind::RegIn) {
                    seen_body = true;
                }
                if seen_control_flow && !node.is_control_flow() && !node.is_proj() {
                    return Err(LirError::ValidationError {
                        message: format!(
                            "node %{} scheduled after control-flow ops",
                            id.index()
                        ),
                        block_id: Some(block_id),
                    });
                }
                if node.is_control_flow() {
                    seen_control_flow = true;
                }
            }
        }
        Ok(())
    }
}

impl PrettyPrint for Function {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();
        let base = indent_str(indent);
        result.push_str(&format!("{}fn {}:\n", base, self.name));

        for (block_id, block) in self.block_iter() {
            let preds = block
                .preds
                .iter()
                .map(|p| format!("bb{}", p.index()))
                .collect::<Vec<_>>()
                .join(", ");
            match &block.name {
                Some(name) => result.push_str(&format!(
                    "{}bb{} ({}): preds [{}]\n",
                    base,
                    block_id.index(),
                    name,
                    preds
                )),
                None => result.push_str(&format!(
                    "{}bb{}: preds [{}]\n",
                    base,
                    block_id.index(),
                    preds
                )),
            }
            for &id in &block.schedule {
                result.push_str(&format!(
                    "{}  %{}: {}\n",
                    base,
                    id.index(),
                    self.nodes[id].pretty_print(0)
                ));
            }
            result.push_str(&format!(
                "{}  {}\n",
                base,
                block.terminator.pretty_print(0)
            ));
        }

        result
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_print(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Terminator;

    #[test]
    fn test_phi_insertion_keeps_head_invariant() {
        let mut f = Function::new("t");
        let entry = f.entry_block;
        let a = f.new_op(entry, "const", vec![], false);
        let phi = f.new_phi(entry, vec![]);
        assert_eq!(f.blocks[entry].schedule, vec![phi, a]);
        assert_eq!(f.phis_of(entry), vec![phi]);
    }

    #[test]
    fn test_validate_checks_edges() {
        let mut f = Function::new("t");
        let entry = f.entry_block;
        let exit = f.add_block();
        f.blocks[entry].set_terminator(Terminator::jump(exit));
        assert!(f.validate().is_err());
        f.connect(entry, exit);
        f.blocks[exit].set_terminator(Terminator::return_values(vec![]));
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_pinning_table() {
        let mut f = Function::new("t");
        let entry = f.entry_block;
        let a = f.new_op(entry, "const", vec![], false);
        assert!(!f.is_pinned(a));
        f.pin(a, entry);
        assert_eq!(f.pinning_block(a), Some(entry));
        f.clear_pins();
        assert!(!f.is_pinned(a));
    }
}
