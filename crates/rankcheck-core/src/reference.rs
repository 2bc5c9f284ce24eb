//! Fixed-point reference PageRank.
//!
//! # Overview
//!
//! The hardware computes PageRank by message passing: every iteration each
//! vertex sends `rank / out_degree` to its successors in a packet whose low
//! bits carry an iteration tag. This engine reproduces that computation
//! bit-for-bit so its output can be diffed against the hardware's.
//!
//! # Algorithm
//!
//! Per iteration:
//!
//! ```text
//! packet(u)  = lossy_encode(rank(u) / out_degree(u))
//! acc(v)     = Σ packet(u)                      for each u → v
//! next(v)    = damping_sum + damping_factor * acc(v)
//! ```
//!
//! with `damping_sum = (1 - d) / N`. Both damping terms are converted to
//! fixed point once per run. Nodes with no outgoing edges send nothing; the
//! teleport term is the only mass they receive back.
//!
//! The run has converged when the L1 distance between successive vectors
//! drops below `N * tolerance`.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::error::RankError;
use crate::fixed::FixedPoint;
use crate::graph::ValidatedGraph;
use crate::rank::{RankVector, convergence_threshold_bits};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the reference computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Damping factor (probability of following a link vs teleporting).
    /// Default: 0.85.
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Per-node convergence tolerance, also the comparison tolerance.
    /// Default: 1e-5.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Maximum number of iterations.
    /// Default: 100.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            tolerance: default_tolerance(),
            max_iter: default_max_iter(),
        }
    }
}

const fn default_damping() -> f64 {
    0.85
}

/// Five decimal places.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

const fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

const fn default_max_iter() -> usize {
    100
}

/// Damping constants in fixed point, computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DampingTerms {
    /// `damping`.
    pub factor: FixedPoint,
    /// `(1 - damping) / node_count`.
    pub sum: FixedPoint,
}

impl DampingTerms {
    /// Convert `damping` and the per-node teleport term.
    ///
    /// # Errors
    ///
    /// Fails with a range error when `node_count` is zero or a term is not
    /// representable.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(damping: f64, node_count: usize) -> Result<Self, RankError> {
        if node_count == 0 {
            return Err(RankError::InvalidParameter(
                "node_count must be > 0".to_string(),
            ));
        }
        Ok(Self {
            factor: FixedPoint::from_f64(damping)?,
            sum: FixedPoint::from_f64((1.0 - damping) / node_count as f64)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A converged reference computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceResult {
    /// Ranks at convergence, indexed by node id.
    pub ranks: RankVector,
    /// 1-based iteration at which convergence was detected.
    pub iterations: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Fixed-point power iteration over an id-indexed graph.
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    adjacency: DiGraph<(), ()>,
    out_degree: Vec<u32>,
    damping: DampingTerms,
}

impl ReferenceEngine {
    /// Engine for a validated graph.
    ///
    /// # Errors
    ///
    /// Fails if the damping terms cannot be represented.
    pub fn new(graph: &ValidatedGraph, damping: f64) -> Result<Self, RankError> {
        let terms = DampingTerms::new(damping, graph.node_count())?;
        Ok(Self::from_edges(graph.node_count(), graph.edges(), terms))
    }

    /// Engine for `node_count` dense ids and an id-indexed edge list.
    ///
    /// Edges referring to ids `>= node_count` grow the node set.
    #[must_use]
    pub fn from_edges(node_count: usize, edges: &[(usize, usize)], damping: DampingTerms) -> Self {
        let mut adjacency = DiGraph::with_capacity(node_count, edges.len());
        let needed = edges
            .iter()
            .map(|&(s, t)| s.max(t) + 1)
            .max()
            .unwrap_or(0)
            .max(node_count);
        for _ in 0..needed {
            adjacency.add_node(());
        }
        for &(s, t) in edges {
            adjacency.add_edge(NodeIndex::new(s), NodeIndex::new(t), ());
        }

        let out_degree = adjacency
            .node_indices()
            .map(|n| {
                let count = adjacency.edges_directed(n, Direction::Outgoing).count();
                u32::try_from(count).unwrap_or(u32::MAX)
            })
            .collect();

        Self {
            adjacency,
            out_degree,
            damping,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.out_degree.len()
    }

    #[must_use]
    pub const fn damping(&self) -> DampingTerms {
        self.damping
    }

    /// `1 / N` for every node.
    #[must_use]
    pub fn initial_ranks(&self) -> RankVector {
        let n = u32::try_from(self.node_count()).unwrap_or(u32::MAX);
        let init = FixedPoint::ONE.div_int(n).unwrap_or(FixedPoint::ZERO);
        RankVector::uniform(self.node_count(), init)
    }

    /// One iteration with every packet delivered.
    #[must_use]
    pub fn step(&self, ranks: &RankVector) -> RankVector {
        self.step_filtered(ranks, |_, _| true).0
    }

    /// One iteration where `deliver(source, target)` decides whether each
    /// packet arrives. Returns the next vector and the number of packets
    /// dropped. Nodes missing from a short `ranks` send nothing.
    pub fn step_filtered<F>(&self, ranks: &RankVector, mut deliver: F) -> (RankVector, usize)
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut acc = vec![FixedPoint::ZERO; self.node_count()];
        let mut dropped = 0_usize;

        for node in self.adjacency.node_indices() {
            let idx = node.index();
            let Some(packet) = ranks
                .as_slice()
                .get(idx)
                .and_then(|rank| rank.div_int(self.out_degree[idx]))
            else {
                continue;
            };
            let payload = packet.lossy_encode();
            trace!(
                "[#{idx:4}] sending pkt {packet} [{packet:08x}] as {payload:08x}"
            );

            for edge in self.adjacency.edges_directed(node, Direction::Outgoing) {
                let target = edge.target().index();
                if deliver(idx, target) {
                    acc[target] = acc[target] + payload;
                } else {
                    dropped += 1;
                }
            }
        }

        let next = acc
            .into_iter()
            .enumerate()
            .map(|(idx, received)| {
                let damped = self.damping.sum + self.damping.factor * received;
                trace!(
                    "[idx={idx:4}] {} * {received:08x} + {:08x} = {damped:08x}",
                    self.damping.factor,
                    self.damping.sum
                );
                damped
            })
            .collect();

        (next, dropped)
    }

    /// Iterate from [`initial_ranks`](Self::initial_ranks) until converged.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::NoConvergence`] when `max_iter` iterations pass
    /// without meeting the tolerance, or a range error if `tolerance` is not
    /// representable.
    #[instrument(skip(self), fields(nodes = self.node_count()))]
    pub fn converge(&self, tolerance: f64, max_iter: usize) -> Result<ReferenceResult, RankError> {
        let threshold =
            convergence_threshold_bits(self.node_count(), FixedPoint::from_f64(tolerance)?);

        let mut ranks = self.initial_ranks();
        for iter_no in 0..max_iter {
            let next = self.step(&ranks);
            let err = next.l1_distance_bits(&ranks);
            trace!(iter_no, err, threshold, "iteration complete");

            if err < threshold {
                debug!(iterations = iter_no + 1, "reference PageRank converged");
                return Ok(ReferenceResult {
                    ranks: next,
                    iterations: iter_no + 1,
                });
            }
            ranks = next;
        }

        Err(RankError::NoConvergence { max_iter })
    }

    /// Initial vector followed by `iterations` successive steps.
    #[must_use]
    pub fn history(&self, iterations: usize) -> Vec<RankVector> {
        let mut rows = Vec::with_capacity(iterations + 1);
        let mut ranks = self.initial_ranks();
        for _ in 0..iterations {
            let next = self.step(&ranks);
            rows.push(std::mem::replace(&mut ranks, next));
        }
        rows.push(ranks);
        rows
    }
}

/// Compute the reference ranks of a validated graph.
///
/// # Errors
///
/// See [`ReferenceEngine::new`] and [`ReferenceEngine::converge`].
pub fn reference_pagerank(
    graph: &ValidatedGraph,
    config: &ReferenceConfig,
) -> Result<ReferenceResult, RankError> {
    ReferenceEngine::new(graph, config.damping)?.converge(config.tolerance, config.max_iter)
}
