//! # PBQP Graph
//!
//! Nodes carry a cost vector (one entry per choice), edges carry a cost
//! matrix of shape `|src choices| x |tgt choices|`. Edges are semantically
//! undirected; direction only selects row versus column indexing.
//!
//! Reduction never deletes anything: removing a node from the live graph
//! detaches its edges from the *surviving* endpoints only, while the node
//! keeps its incident list exactly as it was at removal time so
//! back-propagation can consult the same matrices.

use index_vec::IndexVec;

use super::costs::{CostMatrix, CostVector};

index_vec::define_index_type! {
    /// Unique identifier for a PBQP node
    pub struct NodeId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a PBQP edge
    pub struct EdgeId = usize;
}

/// The rule that removed a node from the live graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionRule {
    /// Degree 1: folded into the single neighbor
    R1,
    /// Degree 2: folded into an edge between the two neighbors
    R2,
    /// Degree >= 3: removed without selection, decided at back-propagation
    RN,
}

/// A PBQP node
#[derive(Debug, Clone)]
pub struct Node {
    /// The cost vector; forward reduction may rewrite it, and the stored
    /// vector is authoritative for back-propagation
    pub costs: CostVector,
    /// Live incident edges while the node is in the graph; frozen at its
    /// state of removal time once the node is reduced
    pub edges: Vec<EdgeId>,
    /// The rule that reduced this node, if any
    pub rule: Option<ReductionRule>,
    /// The chosen cost-vector index, assigned during back-propagation
    pub solution: Option<usize>,
}

impl Node {
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    pub fn is_reduced(&self) -> bool {
        self.rule.is_some()
    }
}

/// A PBQP edge between `src` and `tgt`
#[derive(Debug, Clone)]
pub struct Edge {
    pub src: NodeId,
    pub tgt: NodeId,
    pub costs: CostMatrix,
}

impl Edge {
    /// The endpoint opposite `node`
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.src == node {
            self.tgt
        } else {
            self.src
        }
    }

    pub fn is_src(&self, node: NodeId) -> bool {
        self.src == node
    }
}

/// A PBQP instance
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: IndexVec<NodeId, Node>,
    pub edges: IndexVec<EdgeId, Edge>,
    /// Stack of reduced nodes in removal order; back-propagation walks it
    /// from top to bottom
    pub reduced: Vec<NodeId>,
    /// Total cost determined by the solver
    pub solution: Option<super::costs::Cost>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with the given cost vector
    pub fn add_node(&mut self, costs: CostVector) -> NodeId {
        self.nodes.push(Node {
            costs,
            edges: Vec::new(),
            rule: None,
            solution: None,
        })
    }

    /// Adds an edge with a cost matrix of shape
    /// `|src choices| x |tgt choices|`
    pub fn add_edge(&mut self, src: NodeId, tgt: NodeId, costs: CostMatrix) -> EdgeId {
        assert!(src != tgt, "self edges are not allowed");
        assert_eq!(costs.rows(), self.nodes[src].costs.len());
        assert_eq!(costs.cols(), self.nodes[tgt].costs.len());
        let edge = self.edges.push(Edge { src, tgt, costs });
        self.nodes[src].edges.push(edge);
        self.nodes[tgt].edges.push(edge);
        edge
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    /// The live edge between `a` and `b`, if one exists
    pub fn live_edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.nodes[a]
            .edges
            .iter()
            .copied()
            .find(|&e| self.edges[e].other(a) == b)
    }

    /// Detaches `edge` from `survivor`'s live adjacency; the other endpoint
    /// keeps it for back-propagation
    pub(crate) fn disconnect_from(&mut self, survivor: NodeId, edge: EdgeId) {
        self.nodes[survivor].edges.retain(|&e| e != edge);
    }

    /// Marks `node` reduced by `rule` and pushes it on the trace.
    /// Its incident list is frozen as of now.
    pub(crate) fn mark_reduced(&mut self, node: NodeId, rule: ReductionRule) {
        debug_assert!(self.nodes[node].rule.is_none());
        self.nodes[node].rule = Some(rule);
        self.reduced.push(node);
    }

    /// Ids of all nodes, in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::from_usize)
    }
}
