//! Evaluation-order computation: Kahn's algorithm with a deterministic
//! cycle break.

use minicortex_core::registry::Connection;
use minicortex_core::types::InstanceId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// The result of an order computation: the evaluation sequence plus the set
/// of connections classified as feedback.
#[derive(Debug, Clone)]
pub struct ExecutionOrder {
    /// Instance IDs in evaluation order.
    pub sequence: Vec<InstanceId>,
    /// Indices into the connection list whose source is evaluated at or
    /// after its target; those edges deliver previous-tick values.
    pub feedback: HashSet<usize>,
}

/// Compute the evaluation order over `nodes` (each with its creation
/// sequence number) connected by `connections`.
///
/// Kahn's algorithm with two deterministic rules:
/// - ties within the frontier resolve by creation order, so identical
///   graphs always yield identical sequences;
/// - when the frontier empties with nodes remaining (a cycle), the node
///   with the smallest current in-degree is placed next (ties again by
///   creation order) and the scan proceeds.
///
/// Every node appears exactly once. An edge is feedforward when its source
/// is placed strictly before its target, feedback otherwise; in an acyclic
/// graph every edge is feedforward, and a self-loop is always feedback.
pub fn build_order(nodes: &[(InstanceId, u64)], connections: &[Connection]) -> ExecutionOrder {
    let n = nodes.len();
    let index: HashMap<&InstanceId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id, i))
        .collect();

    let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];
    // Per connection: resolved (source, target) node indices, if both ends exist.
    let mut resolved: Vec<Option<(usize, usize)>> = Vec::with_capacity(connections.len());
    for conn in connections {
        match (index.get(&conn.from_node), index.get(&conn.to_node)) {
            (Some(&s), Some(&t)) => {
                out_edges[s].push(t);
                in_degree[t] += 1;
                resolved.push(Some((s, t)));
            }
            _ => resolved.push(None),
        }
    }

    let mut frontier: BinaryHeap<Reverse<(u64, usize)>> = nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| in_degree[*i] == 0)
        .map(|(i, (_, seq))| Reverse((*seq, i)))
        .collect();

    let mut placed = vec![false; n];
    let mut sequence_idx: Vec<usize> = Vec::with_capacity(n);

    while sequence_idx.len() < n {
        let next = loop {
            match frontier.pop() {
                Some(Reverse((_, i))) if placed[i] => continue,
                Some(Reverse((_, i))) => break Some(i),
                None => break None,
            }
        };
        let next = next.unwrap_or_else(|| {
            // Cycle break: smallest current in-degree, ties by creation order.
            nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .min_by_key(|(i, (_, seq))| (in_degree[*i], *seq))
                .map(|(i, _)| i)
                .expect("unplaced node exists while sequence is incomplete")
        });

        placed[next] = true;
        sequence_idx.push(next);
        for &target in &out_edges[next] {
            if in_degree[target] > 0 {
                in_degree[target] -= 1;
                if in_degree[target] == 0 && !placed[target] {
                    frontier.push(Reverse((nodes[target].1, target)));
                }
            }
        }
    }

    let mut position = vec![0usize; n];
    for (pos, &i) in sequence_idx.iter().enumerate() {
        position[i] = pos;
    }
    let feedback = resolved
        .iter()
        .enumerate()
        .filter_map(|(ci, edge)| {
            edge.and_then(|(s, t)| (position[s] >= position[t]).then_some(ci))
        })
        .collect();

    ExecutionOrder {
        sequence: sequence_idx.into_iter().map(|i| nodes[i].0.clone()).collect(),
        feedback,
    }
}
