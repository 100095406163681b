//! # PBQP Solver Surface
//!
//! A Partitioned Boolean Quadratic Problem assigns one choice per node so
//! that the sum of all node costs (`cost_vector[choice]`) and all edge
//! costs (`matrix[src choice, tgt choice]`) is minimal. The register
//! allocator builds one instance per procedure; nodes are allocation
//! candidates, choices are registers, and `INF` entries forbid
//! combinations.
//!
//! Solving happens in two directions:
//!
//! - **forward reduction** removes nodes of degree one and two exactly,
//!   folding their costs into the surviving graph, and removes
//!   higher-degree nodes without selection, guided by the reverse perfect
//!   elimination order
//! - **back-propagation** walks the recorded removal trace in reverse and
//!   assigns each node its locally optimal choice against the neighbors
//!   that are already fixed
//!
//! The trace has strict LIFO discipline; nothing here may be reordered or
//! parallelized without proving the trace a partial order first.

pub mod back_propagation;
pub mod costs;
pub mod graph;
pub mod reduction;

pub use costs::{Cost, CostMatrix, CostVector};
pub use graph::{Graph, NodeId, ReductionRule};

use crate::dump::CHANNEL_PBQP;

/// Solves `graph`: forward reduction guided by `rpeo`, then
/// back-propagation. Stores a solution index on every node and the total
/// cost on the graph, which is also returned.
pub fn solve_pbqp(graph: &mut Graph, rpeo: &[NodeId]) -> Cost {
    log::debug!(
        target: CHANNEL_PBQP,
        "solving PBQP with {} nodes, {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );

    reduction::reduce(graph, rpeo);
    let total = reduction::determine_solution(graph);
    graph.solution = Some(total);

    back_propagation::back_propagate(graph);

    log::debug!(target: CHANNEL_PBQP, "solution cost {total}");
    total
}
