//! # Forward Reduction
//!
//! The reduction half of the solver: repeatedly remove low-degree nodes,
//! folding their costs into the surviving graph, and record the removal
//! order. Degree-1 nodes fold into their neighbor's vector (R1), degree-2
//! nodes into an edge between their two neighbors (R2). When only nodes of
//! degree three or more remain, the next unreduced node of the reverse
//! perfect elimination order is removed *without* selection (RN); its
//! choice is made during back-propagation against its already-assigned
//! neighbors.

use std::collections::VecDeque;

use super::costs::{Cost, CostMatrix};
use super::graph::{Graph, NodeId, ReductionRule};
use crate::dump::CHANNEL_PBQP;

/// Runs the reduction loop until no live node has an edge left
pub(super) fn reduce(graph: &mut Graph, rpeo: &[NodeId]) {
    let mut rpeo: VecDeque<NodeId> = rpeo.iter().copied().collect();

    loop {
        if let Some(node) = find_with_degree(graph, 1) {
            apply_r1(graph, node);
        } else if let Some(node) = find_with_degree(graph, 2) {
            apply_r2(graph, node);
        } else if graph.node_ids().any(|n| !graph.node(n).is_reduced() && graph.node(n).degree() > 0)
        {
            apply_rn(graph, &mut rpeo);
        } else {
            return;
        }
    }
}

fn find_with_degree(graph: &Graph, degree: usize) -> Option<NodeId> {
    graph
        .node_ids()
        .find(|&n| !graph.node(n).is_reduced() && graph.node(n).degree() == degree)
}

/// R1: fold `node` and its single edge into the neighbor's cost vector
fn apply_r1(graph: &mut Graph, node: NodeId) {
    let edge_id = graph.node(node).edges[0];
    let edge = graph.edge(edge_id);
    let is_src = edge.is_src(node);
    let other = edge.other(node);

    // for every neighbor choice, the cheapest completion through `node`
    let n_other = graph.node(other).costs.len();
    let mut deltas = Vec::with_capacity(n_other);
    for j in 0..n_other {
        let node_costs = &graph.node(node).costs;
        let matrix = &graph.edge(edge_id).costs;
        let mut best = Cost::INF;
        for i in 0..node_costs.len() {
            let through = if is_src {
                node_costs.get(i) + matrix.get(i, j)
            } else {
                node_costs.get(i) + matrix.get(j, i)
            };
            if through < best {
                best = through;
            }
        }
        deltas.push(best);
    }
    for (j, delta) in deltas.into_iter().enumerate() {
        graph.nodes[other].costs.add_at(j, delta);
    }

    graph.disconnect_from(other, edge_id);
    graph.mark_reduced(node, ReductionRule::R1);
    log::debug!(
        target: CHANNEL_PBQP,
        "R1: node n{} folded into n{}",
        node.index(),
        other.index()
    );
}

/// R2: fold `node` and its two edges into an edge between its neighbors
fn apply_r2(graph: &mut Graph, node: NodeId) {
    let first_edge = graph.node(node).edges[0];
    let second_edge = graph.node(node).edges[1];
    let first_other = graph.edge(first_edge).other(node);
    let second_other = graph.edge(second_edge).other(node);

    if first_other == second_other {
        // parallel edges to one neighbor: fold both into its vector
        let n_other = graph.node(first_other).costs.len();
        let mut deltas = Vec::with_capacity(n_other);
        for j in 0..n_other {
            let mut best = Cost::INF;
            for i in 0..graph.node(node).costs.len() {
                let through = graph.node(node).costs.get(i)
                    + edge_cost(graph, first_edge, node, i, j)
                    + edge_cost(graph, second_edge, node, i, j);
                if through < best {
                    best = through;
                }
            }
            deltas.push(best);
        }
        for (j, delta) in deltas.into_iter().enumerate() {
            graph.nodes[first_other].costs.add_at(j, delta);
        }
        graph.disconnect_from(first_other, first_edge);
        graph.disconnect_from(first_other, second_edge);
        graph.mark_reduced(node, ReductionRule::R2);
        log::debug!(
            target: CHANNEL_PBQP,
            "R2: node n{} folded into n{} (parallel edges)",
            node.index(),
            first_other.index()
        );
        return;
    }

    // combined[j][k] = min over node choices i of
    //   node.costs[i] + first(i, j) + second(i, k)
    let n_first = graph.node(first_other).costs.len();
    let n_second = graph.node(second_other).costs.len();
    let mut combined = CostMatrix::zeros(n_first, n_second);
    for j in 0..n_first {
        for k in 0..n_second {
            let mut best = Cost::INF;
            for i in 0..graph.node(node).costs.len() {
                let first = edge_cost(graph, first_edge, node, i, j);
                let second = edge_cost(graph, second_edge, node, i, k);
                let through = graph.node(node).costs.get(i) + first + second;
                if through < best {
                    best = through;
                }
            }
            combined.set(j, k, best);
        }
    }

    graph.disconnect_from(first_other, first_edge);
    graph.disconnect_from(second_other, second_edge);

    // accumulate onto an existing live edge if the neighbors share one
    match graph.live_edge_between(first_other, second_other) {
        Some(existing) => {
            let oriented_forward = graph.edge(existing).src == first_other;
            for j in 0..n_first {
                for k in 0..n_second {
                    if oriented_forward {
                        graph.edges[existing].costs.add_at(j, k, combined.get(j, k));
                    } else {
                        graph.edges[existing].costs.add_at(k, j, combined.get(j, k));
                    }
                }
            }
        }
        None => {
            graph.add_edge(first_other, second_other, combined);
        }
    }

    graph.mark_reduced(node, ReductionRule::R2);
    log::debug!(
        target: CHANNEL_PBQP,
        "R2: node n{} folded into edge n{} -- n{}",
        node.index(),
        first_other.index(),
        second_other.index()
    );
}

/// Cost of `edge` when `node` picks `node_choice` and the other endpoint
/// picks `other_choice`
fn edge_cost(
    graph: &Graph,
    edge: super::graph::EdgeId,
    node: NodeId,
    node_choice: usize,
    other_choice: usize,
) -> Cost {
    let edge = graph.edge(edge);
    if edge.is_src(node) {
        edge.costs.get(node_choice, other_choice)
    } else {
        edge.costs.get(other_choice, node_choice)
    }
}

/// RN without selection: take the next unreduced node off the back of the
/// reverse perfect elimination order (rotating it to the front so the
/// order still exists after solving) and disconnect it from its neighbors
fn apply_rn(graph: &mut Graph, rpeo: &mut VecDeque<NodeId>) {
    let mut rotations = 0usize;
    let node = loop {
        let candidate = rpeo
            .pop_back()
            .expect("reverse perfect elimination order exhausted with live nodes left");
        rpeo.push_front(candidate);
        if !graph.node(candidate).is_reduced() && graph.node(candidate).degree() > 0 {
            break candidate;
        }
        rotations += 1;
        assert!(
            rotations <= rpeo.len(),
            "reverse perfect elimination order does not cover the live graph"
        );
    };

    assert!(
        graph.node(node).degree() > 2,
        "RN applied to node n{} of degree {}",
        node.index(),
        graph.node(node).degree()
    );

    for edge_index in 0..graph.node(node).degree() {
        let edge_id = graph.node(node).edges[edge_index];
        let neighbor = graph.edge(edge_id).other(node);
        graph.disconnect_from(neighbor, edge_id);
    }

    graph.mark_reduced(node, ReductionRule::RN);
    log::debug!(target: CHANNEL_PBQP, "RN: node n{} removed without selection", node.index());
}

/// Fixes the remaining degree-0 nodes to their cheapest choice and returns
/// the sum of their minima: the graph total (exact when no RN fired, the
/// usual lower-bound accounting otherwise)
pub(super) fn determine_solution(graph: &mut Graph) -> Cost {
    let mut total = Cost::ZERO;
    for node_id in graph.node_ids().collect::<Vec<_>>() {
        let node = graph.node(node_id);
        if node.is_reduced() {
            continue;
        }
        debug_assert_eq!(node.degree(), 0);
        let choice = node.costs.min_index();
        total += node.costs.min();
        graph.nodes[node_id].solution = Some(choice);
        log::debug!(
            target: CHANNEL_PBQP,
            "node n{} fixed to {} (degree 0)",
            node_id.index(),
            choice
        );
    }
    total
}
