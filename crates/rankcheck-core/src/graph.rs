//! Graph model and the eager validation gate.
//!
//! A [`Graph`] is a list of labelled directed edges plus an optional explicit
//! label list. [`validate`] checks it once, before any iteration or backend
//! work, and produces a [`ValidatedGraph`] with a dense `label -> id` mapping
//! that every downstream component indexes by.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RankError;

/// Labelled directed edge list as supplied by a user or generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// `(source, target)` label pairs.
    pub edges: Vec<(String, String)>,
    /// Explicit label order. When `None`, labels are inferred from the edges
    /// and ordered lexicographically.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl Graph {
    /// Graph whose labels are inferred from its edges.
    #[must_use]
    pub fn new(edges: Vec<(String, String)>) -> Self {
        Self {
            edges,
            labels: None,
        }
    }

    /// Graph with an explicit label list, which fixes the id order.
    #[must_use]
    pub fn with_labels(edges: Vec<(String, String)>, labels: Vec<String>) -> Self {
        Self {
            edges,
            labels: Some(labels),
        }
    }

    /// Convenience constructor from string slices.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(s, t)| ((*s).to_string(), (*t).to_string()))
                .collect(),
        )
    }

    /// Labels actually referenced by at least one edge.
    #[must_use]
    pub fn referenced_labels(&self) -> BTreeSet<&str> {
        self.edges
            .iter()
            .flat_map(|(s, t)| [s.as_str(), t.as_str()])
            .collect()
    }
}

/// A graph that passed [`validate`]: dense ids, id-indexed edges and degrees.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    labels: Vec<String>,
    edges: Vec<(usize, usize)>,
    adjacency: DiGraph<String, ()>,
}

impl ValidatedGraph {
    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    /// Labels in id order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Dense node ids `0..node_count`.
    #[must_use]
    pub fn node_ids(&self) -> Vec<usize> {
        (0..self.labels.len()).collect()
    }

    /// Edges as `(source_id, target_id)` in input order.
    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Adjacency used by the reference engine.
    #[must_use]
    pub fn adjacency(&self) -> &DiGraph<String, ()> {
        &self.adjacency
    }

    /// Number of outgoing edges of node `id`.
    #[must_use]
    pub fn out_degree(&self, id: usize) -> usize {
        self.adjacency
            .neighbors_directed(NodeIndex::new(id), Direction::Outgoing)
            .count()
    }

    /// Number of incoming edges of node `id`.
    #[must_use]
    pub fn in_degree(&self, id: usize) -> usize {
        self.adjacency
            .neighbors_directed(NodeIndex::new(id), Direction::Incoming)
            .count()
    }

    /// Id of `label`, if present.
    #[must_use]
    pub fn id_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Validate graph structure and damping range.
///
/// Checks, in order: non-empty edge list, no repeated directed edge, label
/// list (when given) free of duplicates and equal as a set to the labels the
/// edges reference, and `damping` in `[0, 1)`. Self-loops are allowed.
///
/// # Errors
///
/// Returns a structure-class [`RankError`] for malformed graphs and
/// [`RankError::DampingOutOfRange`] for a bad damping factor.
pub fn validate(graph: &Graph, damping: f64) -> Result<ValidatedGraph, RankError> {
    if graph.edges.is_empty() {
        return Err(RankError::EmptyGraph);
    }

    let unique: HashSet<&(String, String)> = graph.edges.iter().collect();
    let duplicates = graph.edges.len() - unique.len();
    if duplicates != 0 {
        return Err(RankError::DuplicateEdges { count: duplicates });
    }

    let referenced = graph.referenced_labels();
    let labels: Vec<String> = match &graph.labels {
        Some(declared) => {
            let declared_set: BTreeSet<&str> = declared.iter().map(String::as_str).collect();
            if declared_set.len() != declared.len() {
                return Err(RankError::DuplicateLabels {
                    count: declared.len() - declared_set.len(),
                });
            }
            if declared_set != referenced {
                return Err(RankError::LabelMismatch {
                    declared: declared_set.len(),
                    referenced: referenced.len(),
                    dangling: declared_set
                        .difference(&referenced)
                        .map(|s| (*s).to_string())
                        .collect(),
                    missing: referenced
                        .difference(&declared_set)
                        .map(|s| (*s).to_string())
                        .collect(),
                });
            }
            declared.clone()
        }
        None => referenced.iter().map(|s| (*s).to_string()).collect(),
    };

    if !(0.0..1.0).contains(&damping) {
        return Err(RankError::DampingOutOfRange { damping });
    }

    let ids: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(id, label)| (label.as_str(), id))
        .collect();

    let mut adjacency = DiGraph::with_capacity(labels.len(), graph.edges.len());
    for label in &labels {
        adjacency.add_node(label.clone());
    }

    let mut edges = Vec::with_capacity(graph.edges.len());
    for (source, target) in &graph.edges {
        let (s, t) = (ids[source.as_str()], ids[target.as_str()]);
        adjacency.add_edge(NodeIndex::new(s), NodeIndex::new(t), ());
        edges.push((s, t));
    }

    debug!(
        nodes = labels.len(),
        edges = edges.len(),
        "graph validated"
    );

    Ok(ValidatedGraph {
        labels,
        edges,
        adjacency,
    })
}
