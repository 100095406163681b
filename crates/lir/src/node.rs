//! # LIR Nodes
//!
//! Every value in a function is a node in the per-function arena. Nodes are
//! scheduled inside basic blocks; a node's result lives in the physical
//! register recorded on it. Nodes are rewritten in place or removed from
//! schedules, but the arena never shrinks, so `NodeId`s stay valid for the
//! lifetime of the function.

use crate::{BlockId, NodeId, PrettyPrint};

/// The operation a node performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An opaque target instruction with ordinary operands.
    ///
    /// `control_flow` marks branch-material ops that must remain glued to
    /// the end of their block; insertion points skip over them.
    Op {
        name: String,
        ins: Vec<NodeId>,
        control_flow: bool,
    },

    /// An SSA merge: one argument per predecessor of the owning block,
    /// positionally matched with `Block::preds`
    Phi { args: Vec<NodeId> },

    /// A register-to-register move of `src`'s value
    Copy { src: NodeId },

    /// A multi-in/multi-out permutation of its inputs onto its output
    /// projections; lowered later to hardware moves or swaps
    Perm { ins: Vec<NodeId> },

    /// One output of a `Perm`: the value of the perm's `pos`-th input
    Proj { perm: NodeId, pos: usize },

    /// A value that arrives in its assigned register at block entry.
    /// Produced by phi removal once every incoming path deposits the value
    /// in that register.
    RegIn,
}

/// A node in the LIR graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,

    /// The block this node is (or was) scheduled in
    pub block: BlockId,

    /// The physical register holding this node's value, as an index into
    /// its register class
    pub register: Option<usize>,

    /// Name of the register class `register` indexes into
    pub reg_class: Option<String>,

    /// For copies and projections: the original value this node duplicates,
    /// kept for downstream debugging
    pub copy_of: Option<NodeId>,
}

impl Node {
    pub const fn new(kind: NodeKind, block: BlockId) -> Self {
        Self {
            kind,
            block,
            register: None,
            reg_class: None,
            copy_of: None,
        }
    }

    pub const fn is_phi(&self) -> bool {
        matches!(self.kind, NodeKind::Phi { .. })
    }

    pub const fn is_proj(&self) -> bool {
        matches!(self.kind, NodeKind::Proj { .. })
    }

    pub const fn is_control_flow(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Op {
                control_flow: true,
                ..
            }
        )
    }

    /// The operand nodes this node reads
    pub fn ins(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Op { ins, .. } | NodeKind::Perm { ins } => ins,
            NodeKind::Phi { args } => args,
            NodeKind::Copy { src } => std::slice::from_ref(src),
            NodeKind::Proj { perm, .. } => std::slice::from_ref(perm),
            NodeKind::RegIn => &[],
        }
    }

    /// Mutable access to the operand list, if the node has one
    pub fn ins_mut(&mut self) -> &mut [NodeId] {
        match &mut self.kind {
            NodeKind::Op { ins, .. } | NodeKind::Perm { ins } => ins,
            NodeKind::Phi { args } => args,
            NodeKind::Copy { src } => std::slice::from_mut(src),
            NodeKind::Proj { perm, .. } => std::slice::from_mut(perm),
            NodeKind::RegIn => &mut [],
        }
    }
}

impl PrettyPrint for Node {
    fn pretty_print(&self, _indent: usize) -> String {
        let reg = self
            .register
            .map_or_else(|| "?".to_string(), |r| format!("r{r}"));
        match &self.kind {
            NodeKind::Op {
                name,
                ins,
                control_flow,
            } => {
                let ins = ins
                    .iter()
                    .map(|n| format!("%{}", n.index()))
                    .collect::<Vec<_>>()
                    .join(", ");
                let cf = if *control_flow { " [cf]" } else { "" };
                format!("{reg} = {name}({ins}){cf}")
            }
            NodeKind::Phi { args } => {
                let args = args
                    .iter()
                    .map(|n| format!("%{}", n.index()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{reg} = phi [{args}]")
            }
            NodeKind::Copy { src } => format!("{reg} = copy %{}", src.index()),
            NodeKind::Perm { ins } => {
                let ins = ins
                    .iter()
                    .map(|n| format!("%{}", n.index()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("perm({ins})")
            }
            NodeKind::Proj { perm, pos } => {
                format!("{reg} = proj %{} #{pos}", perm.index())
            }
            NodeKind::RegIn => format!("{reg} = reg_in"),
        }
    }
}
