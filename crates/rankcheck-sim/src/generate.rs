//! Random graph generation for robustness campaigns.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use rankcheck_core::error::RankError;
use rankcheck_core::graph::Graph;

/// Label of generated node `id`.
#[must_use]
pub fn node_label(id: usize) -> String {
    format!("#{id}")
}

/// Random graph with `node_count` nodes labelled `#0..#N-1` and exactly
/// `edge_count` distinct directed edges.
///
/// Every node gets one outgoing edge to a uniformly chosen target first, so
/// no rank leaks out of the graph; the remaining edges are drawn uniformly
/// from the pairs not yet used. Self-loops are allowed.
///
/// # Errors
///
/// Returns [`RankError::InvalidParameter`] unless
/// `1 <= node_count <= edge_count <= node_count^2`.
pub fn random_graph<R: Rng + ?Sized>(
    node_count: usize,
    edge_count: usize,
    rng: &mut R,
) -> Result<Graph, RankError> {
    let max_edges = node_count.checked_mul(node_count).ok_or_else(|| {
        RankError::InvalidParameter(format!("node_count {node_count} is too large"))
    })?;
    if node_count == 0 || edge_count < node_count || edge_count > max_edges {
        return Err(RankError::InvalidParameter(format!(
            "need 1 <= node_count={node_count} <= edge_count={edge_count} <= {max_edges}"
        )));
    }

    let mut seen: HashSet<(usize, usize)> = HashSet::with_capacity(edge_count);
    let mut edges: Vec<(usize, usize)> = Vec::with_capacity(edge_count);
    for source in 0..node_count {
        let e = (source, rng.gen_range(0..node_count));
        seen.insert(e);
        edges.push(e);
    }

    let remaining = edge_count - node_count;
    if remaining * 2 > max_edges - node_count {
        // Dense: sample from the unused pairs directly.
        let mut free: Vec<(usize, usize)> = (0..node_count)
            .flat_map(|s| (0..node_count).map(move |t| (s, t)))
            .filter(|e| !seen.contains(e))
            .collect();
        free.shuffle(rng);
        edges.extend(free.into_iter().take(remaining));
    } else {
        while edges.len() < edge_count {
            let e = (rng.gen_range(0..node_count), rng.gen_range(0..node_count));
            if seen.insert(e) {
                edges.push(e);
            }
        }
    }

    Ok(Graph::with_labels(
        edges
            .into_iter()
            .map(|(s, t)| (node_label(s), node_label(t)))
            .collect(),
        (0..node_count).map(node_label).collect(),
    ))
}
