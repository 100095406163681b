//! # Back-Propagation
//!
//! Reconstructs a node assignment from the recorded reduction trace. The
//! trace is walked from top to bottom (most recently reduced first), which
//! is exactly the reverse of the forward reduction order, so every neighbor
//! a node consults has already been assigned. Each node takes the locally
//! optimal choice against its neighbors, using the cost matrices its frozen
//! incident list still points at and its stored cost vector, which is
//! authoritative even when the forward solver rewrote it.

use super::costs::CostVector;
use super::graph::{Graph, NodeId, ReductionRule};
use crate::dump::CHANNEL_PBQP;

/// Assigns `solution` to every node on the reduction trace
pub(super) fn back_propagate(graph: &mut Graph) {
    log::debug!(target: CHANNEL_PBQP, "back propagation of {} nodes", graph.reduced.len());

    for index in (0..graph.reduced.len()).rev() {
        let node = graph.reduced[index];
        let rule = graph.node(node).rule.expect("node on trace without rule");
        let choice = match rule {
            ReductionRule::R1 => back_propagate_r1(graph, node),
            ReductionRule::R2 => back_propagate_r2(graph, node),
            ReductionRule::RN => back_propagate_rn(graph, node),
        };
        graph.nodes[node].solution = Some(choice);
        log::debug!(target: CHANNEL_PBQP, "node n{} is set to {}", node.index(), choice);
    }
}

/// Degree 1: row or column argmin against the single neighbor
fn back_propagate_r1(graph: &Graph, node: NodeId) -> usize {
    let edge = graph.edge(graph.node(node).edges[0]);
    let other = edge.other(node);
    let other_solution = solution_of(graph, other);
    let vec = &graph.node(node).costs;

    if edge.is_src(node) {
        edge.costs.col_min_index(other_solution, vec)
    } else {
        edge.costs.row_min_index(other_solution, vec)
    }
}

/// Degree 2: accumulate the matching row/column of both incident matrices
/// and take the argmin. The smaller-indexed neighbor is considered first
/// so ties resolve the same way the forward solver broke them.
fn back_propagate_r2(graph: &Graph, node: NodeId) -> usize {
    let mut first_edge = graph.node(node).edges[0];
    let mut second_edge = graph.node(node).edges[1];
    let mut first_other = graph.edge(first_edge).other(node);
    let mut second_other = graph.edge(second_edge).other(node);

    // swap edge roles if the neighbor indices are in decreasing order
    if second_other < first_other {
        std::mem::swap(&mut first_edge, &mut second_edge);
        std::mem::swap(&mut first_other, &mut second_other);
    }

    let mut vec = graph.node(node).costs.clone();
    accumulate(graph, &mut vec, node, first_edge, solution_of(graph, first_other));
    accumulate(graph, &mut vec, node, second_edge, solution_of(graph, second_other));

    vec.min_index()
}

/// Degree >= 3: accumulate one row/column per incident edge
fn back_propagate_rn(graph: &Graph, node: NodeId) -> usize {
    let mut vec = graph.node(node).costs.clone();

    for edge_index in 0..graph.node(node).degree() {
        let edge_id = graph.node(node).edges[edge_index];
        let neighbor = graph.edge(edge_id).other(node);
        accumulate(graph, &mut vec, node, edge_id, solution_of(graph, neighbor));
    }

    assert!(
        !vec.min().is_infinite(),
        "infeasible assignment: node n{} has no finite choice left",
        node.index()
    );
    vec.min_index()
}

/// Adds the row or column of `edge` selected by the neighbor's solution,
/// column if `node` is the source side, row if it is the target
fn accumulate(
    graph: &Graph,
    vec: &mut CostVector,
    node: NodeId,
    edge: super::graph::EdgeId,
    neighbor_solution: usize,
) {
    let edge = graph.edge(edge);
    if edge.is_src(node) {
        vec.add_matrix_col(&edge.costs, neighbor_solution);
    } else {
        vec.add_matrix_row(&edge.costs, neighbor_solution);
    }
}

fn solution_of(graph: &Graph, node: NodeId) -> usize {
    graph.node(node)
        .solution
        .unwrap_or_else(|| panic!("neighbor n{} consulted before assignment", node.index()))
}
