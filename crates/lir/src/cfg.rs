//! # Control Flow Graph Utilities
//!
//! Successor/predecessor queries and the block orders used by the
//! register-level passes. SSA destruction only needs a stable order;
//! reverse postorder is the one provided.

use crate::{BlockId, Function};

/// Get all successor blocks of a given block
pub fn successors(function: &Function, block_id: BlockId) -> Vec<BlockId> {
    function.blocks[block_id].terminator.target_blocks()
}

/// Get all predecessor blocks of a given block
pub fn predecessors(function: &Function, block_id: BlockId) -> Vec<BlockId> {
    function.blocks[block_id].preds.clone()
}

/// Postorder over the CFG from the entry block
///
/// Unreachable blocks do not appear. Successors are visited in terminator
/// order, so the result is stable across runs.
pub fn postorder(function: &Function) -> Vec<BlockId> {
    let mut visited = vec![false; function.blocks.len()];
    let mut order = Vec::with_capacity(function.blocks.len());
    visit(function, function.entry_block, &mut visited, &mut order);
    order
}

fn visit(function: &Function, block: BlockId, visited: &mut [bool], order: &mut Vec<BlockId>) {
    if visited[block.index()] {
        return;
    }
    visited[block.index()] = true;
    for succ in successors(function, block) {
        visit(function, succ, visited, order);
    }
    order.push(block);
}

/// Reverse postorder over the CFG from the entry block
pub fn reverse_postorder(function: &Function) -> Vec<BlockId> {
    let mut order = postorder(function);
    order.reverse();
    order
}
