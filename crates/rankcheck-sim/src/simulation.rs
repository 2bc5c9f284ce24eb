//! PageRank simulation driver.
//!
//! A [`PageRankSimulation`] holds one validated graph and its run settings.
//! Each [`run`](PageRankSimulation::run) is a full backend lifecycle:
//!
//! 1. setup (inside a [`BackendSession`])
//! 2. build graph: node ids, id edges, per-vertex parameters, damping terms
//! 3. run for `run_time_ms`
//! 4. warning query (`fail_on_warning` turns a warning into an error)
//! 5. provenance extraction
//! 6. rank history extraction and settling
//! 7. verification against the reference engine
//! 8. teardown, or pause with [`run_paused`](PageRankSimulation::run_paused)

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use rankcheck_core::compare::{
    DEFAULT_DIFF_MAX, compare_ranks, format_diff_table, format_ranks_table,
};
use rankcheck_core::error::RankError;
use rankcheck_core::fixed::FixedPoint;
use rankcheck_core::graph::{Graph, ValidatedGraph, validate};
use rankcheck_core::rank::{RankHistory, RankVector};
use rankcheck_core::reference::{ReferenceConfig, ReferenceEngine};

use crate::backend::{
    BackendParams, DEFAULT_PROVENANCE_NAMES, ExecutionBackend, GraphParams, VertexParams,
};
use crate::session::{BackendSession, PausedSession};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Run settings shared by every simulation of a campaign or calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Simulated run time in milliseconds. With the default 0.1 ms timestep
    /// this is 100 iterations.
    /// Default: 10.0.
    #[serde(default = "default_run_time_ms")]
    pub run_time_ms: f64,
    #[serde(default)]
    pub params: BackendParams,
    /// Damping, tolerance and iteration budget of the reference.
    #[serde(default)]
    pub reference: ReferenceConfig,
    /// Turn backend data-loss warnings into [`RankError::WarningThresholdExceeded`].
    #[serde(default)]
    pub fail_on_warning: bool,
    #[serde(default)]
    pub atoms_per_core: Option<usize>,
    /// Provenance counters collected after each run.
    #[serde(default = "default_provenance_names")]
    pub provenance_names: Vec<String>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            run_time_ms: default_run_time_ms(),
            params: BackendParams::default(),
            reference: ReferenceConfig::default(),
            fail_on_warning: false,
            atoms_per_core: None,
            provenance_names: default_provenance_names(),
        }
    }
}

const fn default_run_time_ms() -> f64 {
    10.0
}

fn default_provenance_names() -> Vec<String> {
    DEFAULT_PROVENANCE_NAMES
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl SimulationSettings {
    /// Check ranges that graph validation does not cover.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::InvalidParameter`] for a non-positive run time,
    /// timestep or timing value, or a non-positive tolerance.
    pub fn validate(&self) -> Result<(), RankError> {
        if !is_positive(self.run_time_ms) {
            return Err(RankError::InvalidParameter(format!(
                "run_time_ms must be > 0, got {}",
                self.run_time_ms
            )));
        }
        if !is_positive(self.params.timestep_ms) {
            return Err(RankError::InvalidParameter(format!(
                "timestep_ms must be > 0, got {}",
                self.params.timestep_ms
            )));
        }
        if self.params.time_scale_factor == 0 {
            return Err(RankError::InvalidParameter(
                "time_scale_factor must be > 0".to_string(),
            ));
        }
        if !is_positive(self.reference.tolerance) {
            return Err(RankError::InvalidParameter(format!(
                "tolerance must be > 0, got {}",
                self.reference.tolerance
            )));
        }
        Ok(())
    }
}

/// How much checking a run does after extracting ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyMode {
    /// Report backend convergence only.
    Skip,
    /// Compare against the reference and print every node.
    Full,
    /// Compare against the reference and print at most `max_rows`
    /// mismatching nodes.
    DiffOnly { max_rows: usize },
}

impl Default for VerifyMode {
    fn default() -> Self {
        Self::DiffOnly {
            max_rows: DEFAULT_DIFF_MAX,
        }
    }
}

/// Outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// `true` when the ranks matched, or when verification was skipped.
    pub is_correct: bool,
    /// Settled convergence index of the backend history.
    pub backend_iterations: usize,
    /// Reference convergence iteration; `None` when verification was skipped.
    pub reference_iterations: Option<usize>,
    /// Backend ranks at convergence, in label order.
    pub final_ranks: Vec<f64>,
    pub provenance: BTreeMap<String, u64>,
    /// Human-readable report with the rank table.
    pub report: String,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// One graph plus the settings to run it on a backend.
#[derive(Debug, Clone)]
pub struct PageRankSimulation {
    graph: ValidatedGraph,
    settings: SimulationSettings,
}

impl PageRankSimulation {
    /// Validate `graph` and `settings` up front, before any backend call.
    ///
    /// # Errors
    ///
    /// Returns structure or range errors from validation.
    pub fn new(graph: &Graph, settings: SimulationSettings) -> Result<Self, RankError> {
        settings.validate()?;
        let graph = validate(graph, settings.reference.damping)?;
        Ok(Self { graph, settings })
    }

    #[must_use]
    pub const fn graph(&self) -> &ValidatedGraph {
        &self.graph
    }

    #[must_use]
    pub const fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Same graph and settings with another timing value.
    #[must_use]
    pub fn with_time_scale_factor(&self, time_scale_factor: u32) -> Self {
        let mut next = self.clone();
        next.settings.params.time_scale_factor = time_scale_factor;
        next
    }

    /// Same graph and settings with `fail_on_warning` set.
    #[must_use]
    pub fn failing_on_warning(&self) -> Self {
        let mut next = self.clone();
        next.settings.fail_on_warning = true;
        next
    }

    /// Same graph and settings with `fail_on_warning` cleared.
    #[must_use]
    pub fn tolerating_warnings(&self) -> Self {
        let mut next = self.clone();
        next.settings.fail_on_warning = false;
        next
    }

    /// Same graph and settings, extracting `names` as provenance.
    #[must_use]
    pub fn with_provenance_names(&self, names: &[String]) -> Self {
        let mut next = self.clone();
        next.settings.provenance_names = names.to_vec();
        next
    }

    /// Per-vertex parameters and damping terms for `build_graph`.
    ///
    /// # Errors
    ///
    /// Fails if the damping terms are not representable.
    pub fn graph_params(&self) -> Result<GraphParams, RankError> {
        let engine = ReferenceEngine::new(&self.graph, self.settings.reference.damping)?;
        let rank_init = engine.initial_ranks();
        let vertices = self
            .graph
            .node_ids()
            .into_iter()
            .map(|id| VertexParams {
                rank_init: rank_init[id],
                incoming: degree_u32(self.graph.in_degree(id)),
                outgoing: degree_u32(self.graph.out_degree(id)),
            })
            .collect();
        Ok(GraphParams {
            vertices,
            damping: engine.damping(),
            atoms_per_core: self.settings.atoms_per_core,
        })
    }

    /// Run once and tear the backend down.
    ///
    /// # Errors
    ///
    /// Propagates backend errors unchanged (with context),
    /// [`RankError::WarningThresholdExceeded`] when `fail_on_warning` is set
    /// and the run warned, and [`RankError::NoConvergence`] when the
    /// reference does not converge during verification. Teardown runs in
    /// every case.
    #[instrument(skip(self, backend), fields(
        nodes = self.graph.node_count(),
        time_scale_factor = self.settings.params.time_scale_factor,
    ))]
    pub fn run<B: ExecutionBackend>(
        &self,
        backend: &mut B,
        verify: VerifyMode,
    ) -> Result<Verification> {
        let mut session = BackendSession::open(backend, &self.settings.params)?;
        let verification = self.execute(session.backend(), verify)?;
        session.close()?;
        Ok(verification)
    }

    /// Run once and leave the backend in its post-run state.
    ///
    /// Only a successful run pauses; on error the backend is torn down as in
    /// [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_paused<'a, B: ExecutionBackend>(
        &self,
        backend: &'a mut B,
        verify: VerifyMode,
    ) -> Result<(Verification, PausedSession<'a, B>)> {
        let mut session = BackendSession::open(backend, &self.settings.params)?;
        let verification = self.execute(session.backend(), verify)?;
        Ok((verification, session.pause()))
    }

    /// Run once, hand the paused backend to `on_pause`, then tear down.
    ///
    /// Teardown runs even when `on_pause` fails.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), plus any `on_pause` error.
    pub fn run_pausing<B: ExecutionBackend>(
        &self,
        backend: &mut B,
        verify: VerifyMode,
        on_pause: &mut dyn FnMut(&B) -> Result<()>,
    ) -> Result<Verification> {
        let (verification, paused) = self.run_paused(backend, verify)?;
        let held = on_pause(paused.backend());
        paused.teardown()?;
        held?;
        Ok(verification)
    }

    fn execute<B: ExecutionBackend>(
        &self,
        backend: &mut B,
        verify: VerifyMode,
    ) -> Result<Verification> {
        let params = self.graph_params()?;
        backend
            .build_graph(&self.graph.node_ids(), self.graph.edges(), &params)
            .context("backend graph build failed")?;

        info!(run_time_ms = self.settings.run_time_ms, "running simulation");
        backend
            .simulation_run(self.settings.run_time_ms)
            .context("backend run failed")?;

        if backend.produced_warnings()? {
            warn!("backend run produced provenance warnings");
            if self.settings.fail_on_warning {
                return Err(RankError::WarningThresholdExceeded.into());
            }
        }

        let provenance = backend.extract_provenance(&self.settings.provenance_names)?;

        let mut history = RankHistory::new(backend.extract_ranks()?);
        let backend_iterations =
            history.settle(FixedPoint::from_f64(self.settings.reference.tolerance)?);
        let Some(last) = history.last() else {
            bail!("backend returned an empty rank history");
        };

        self.verify(last, backend_iterations, provenance, verify)
    }

    fn verify(
        &self,
        last: &RankVector,
        backend_iterations: usize,
        provenance: BTreeMap<String, u64>,
        verify: VerifyMode,
    ) -> Result<Verification> {
        let tolerance = self.settings.reference.tolerance;
        let computed = last.to_f64();

        let mut report = String::from("\n");
        let _ = writeln!(
            report,
            "[Backend] Convergence < {tolerance:e} in #{backend_iterations} iterations."
        );

        if verify == VerifyMode::Skip {
            report.push_str("Correctness unchecked.\n");
            info!("{report}");
            return Ok(Verification {
                is_correct: true,
                backend_iterations,
                reference_iterations: None,
                final_ranks: computed,
                provenance,
                report,
            });
        }

        let engine = ReferenceEngine::new(&self.graph, self.settings.reference.damping)?;
        let reference = engine.converge(tolerance, self.settings.reference.max_iter)?;
        let _ = writeln!(
            report,
            "[Reference] Convergence < {tolerance:e} in #{} iterations.",
            reference.iterations
        );

        let expected = reference.ranks.to_f64();
        let comparison = compare_ranks(&computed, &expected, tolerance)?;
        let labels = self.graph.labels();

        if comparison.is_correct {
            report.push_str("CORRECT Page Rank results.\n");
            if verify == VerifyMode::Full {
                report.push_str(&format_ranks_table(labels, &[("Computed", computed.as_slice())]));
            }
            info!("{report}");
        } else {
            report.push_str("INCORRECT Page Rank results.\n");
            let table = match verify {
                VerifyMode::DiffOnly { max_rows } => {
                    format_diff_table(labels, &computed, &expected, tolerance, max_rows)
                }
                _ => format_ranks_table(
                    labels,
                    &[
                        ("Computed", computed.as_slice()),
                        ("Expected", expected.as_slice()),
                    ],
                ),
            };
            report.push_str(&table);
            warn!(mismatched = comparison.mismatched.len(), "{report}");
        }

        Ok(Verification {
            is_correct: comparison.is_correct,
            backend_iterations,
            reference_iterations: Some(reference.iterations),
            final_ranks: computed,
            provenance,
            report,
        })
    }
}

fn is_positive(value: f64) -> bool {
    value > 0.0
}

fn degree_u32(degree: usize) -> u32 {
    u32::try_from(degree).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> Graph {
        Graph::from_pairs(&[("A", "B"), ("B", "C"), ("C", "A")])
    }

    #[test]
    fn new_validates_eagerly() {
        let dup = Graph::from_pairs(&[("A", "B"), ("A", "B")]);
        assert!(matches!(
            PageRankSimulation::new(&dup, SimulationSettings::default()),
            Err(RankError::DuplicateEdges { count: 1 })
        ));

        let settings = SimulationSettings {
            run_time_ms: 0.0,
            ..SimulationSettings::default()
        };
        assert!(matches!(
            PageRankSimulation::new(&ring(), settings),
            Err(RankError::InvalidParameter(_))
        ));
    }

    #[test]
    fn graph_params_carry_degrees_and_initial_rank() {
        let g = Graph::from_pairs(&[("A", "B"), ("A", "C"), ("B", "A"), ("C", "A")]);
        let sim = PageRankSimulation::new(&g, SimulationSettings::default()).expect("valid");
        let params = sim.graph_params().expect("params");
        assert_eq!(params.vertices.len(), 3);
        assert_eq!(params.vertices[0].outgoing, 2);
        assert_eq!(params.vertices[0].incoming, 2);
        assert_eq!(
            params.vertices[1].rank_init,
            FixedPoint::ONE.div_int(3).expect("nonzero")
        );
    }

    #[test]
    fn with_time_scale_factor_only_changes_timing() {
        let sim = PageRankSimulation::new(&ring(), SimulationSettings::default()).expect("valid");
        let slower = sim.with_time_scale_factor(400);
        assert_eq!(slower.settings().params.time_scale_factor, 400);
        assert_eq!(slower.settings().reference, sim.settings().reference);
        assert_eq!(slower.graph().edges(), sim.graph().edges());
    }

    #[test]
    fn default_verify_mode_is_bounded_diff() {
        assert_eq!(
            VerifyMode::default(),
            VerifyMode::DiffOnly {
                max_rows: DEFAULT_DIFF_MAX
            }
        );
    }
}
