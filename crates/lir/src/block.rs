//! # LIR Basic Block
//!
//! A basic block owns an ordered schedule of node ids and a terminator.
//! Phis sit at the head of the schedule; control-flow ops form a contiguous
//! tail just before the terminator.

use crate::{BlockId, NodeId, Terminator};

/// A basic block in the Control Flow Graph
///
/// # Invariants
///
/// - Every block has exactly one terminator
/// - Phi nodes occupy a prefix of the schedule
/// - `control_flow` ops occupy a suffix of the schedule
/// - `preds` is positionally matched with the argument lists of this
///   block's phis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Optional name for debugging purposes
    pub name: Option<String>,

    /// The nodes of this block in execution order
    pub schedule: Vec<NodeId>,

    /// The terminator that ends this block and transfers control
    pub terminator: Terminator,

    /// Explicit CFG edges - predecessors of this block
    pub preds: Vec<BlockId>,
}

impl Block {
    /// Creates a new empty block with an unreachable terminator
    pub const fn new() -> Self {
        Self {
            name: None,
            schedule: Vec::new(),
            terminator: Terminator::Unreachable,
            preds: Vec::new(),
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = terminator;
    }

    /// Add a predecessor, keeping positional order (duplicates are legal:
    /// two edges from the same block are two distinct phi positions)
    pub fn add_pred(&mut self, pred: BlockId) {
        self.preds.push(pred);
    }

    /// Index of `pred` in the predecessor list
    pub fn pred_index(&self, pred: BlockId) -> Option<usize> {
        self.preds.iter().position(|&p| p == pred)
    }

    /// Position of `node` in the schedule
    pub fn schedule_position(&self, node: NodeId) -> Option<usize> {
        self.schedule.iter().position(|&n| n == node)
    }

    /// Remove `node` from the schedule; returns true if it was scheduled
    pub fn unschedule(&mut self, node: NodeId) -> bool {
        match self.schedule_position(node) {
            Some(pos) => {
                self.schedule.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
