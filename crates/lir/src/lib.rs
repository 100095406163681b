//! # Opal LIR: low-level intermediate representation
//!
//! This crate defines the machine-level IR consumed by the register-allocation
//! back end. LIR functions arrive here scheduled and with a physical register
//! assigned to every value; the passes downstream (SSA destruction, PBQP
//! back-propagation) rewrite the graph but never change its shape contract:
//!
//! 1. **Control Flow Graph (CFG)**: functions are directed graphs of basic
//!    blocks; all control flow is explicit through terminators
//! 2. **Node arena**: every value is a node in a per-function `IndexVec`
//!    arena; nodes are rewritten or unscheduled, never deleted
//! 3. **Explicit schedules**: each block carries an ordered schedule of its
//!    nodes, with phis at the head and control-flow ops glued to the tail
//! 4. **Register classes**: a closed register file per class, with `joker`
//!    and `virtual` flags that placement passes must skip
//!
//! ## Architecture
//!
//! ```text
//! Function
//!   blocks: IndexVec<BlockId, Block>
//!   nodes:  IndexVec<NodeId, Node>
//!   entry_block: BlockId
//!
//! Block
//!   schedule: Vec<NodeId>
//!   terminator: Terminator
//!   preds: Vec<BlockId>
//! ```
//!
//! Liveness is a lazily recomputed oracle (`liveness::Liveness`); passes
//! invalidate it after structural edits and query it freely in between.

pub use block::Block;
pub use function::Function;
pub use liveness::Liveness;
pub use node::{Node, NodeKind};
pub use registers::{RegisterClass, RegisterDescr, RegisterKind, MAX_REGS};
pub use schedule::ScheduleCursor;
pub use terminator::Terminator;

pub mod block;
pub mod cfg;
pub mod function;
pub mod liveness;
pub mod node;
pub mod registers;
pub mod schedule;
pub mod terminator;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Unique identifier for a basic block within a function
    pub struct BlockId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a node (value) within a function
    pub struct NodeId = usize;
}

// --- Error Types ---

/// Represents an error in LIR construction or validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LirError {
    /// Invalid LIR structure (validation error)
    ValidationError {
        message: String,
        block_id: Option<BlockId>,
    },
}

impl std::fmt::Display for LirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValidationError { message, block_id } => {
                write!(f, "Validation error: {message}")?;
                if let Some(block_id) = block_id {
                    write!(f, " in block {block_id:?}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LirError {}

/// Result type for LIR operations
pub type LirResult<T> = Result<T, LirError>;

// --- Pretty Printing Support ---

/// Trait for pretty-printing LIR constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
