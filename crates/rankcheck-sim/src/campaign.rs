//! Robustness campaign runner.
//!
//! Generates many random graphs from one seed, runs a trial on each and
//! collects pass/fail statistics. A trial that fails because the reference
//! did not converge says nothing about the backend, so its graph is thrown
//! away and regenerated instead of being counted.

use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use rankcheck_core::error::RankError;
use rankcheck_core::graph::Graph;

use crate::backend::ExecutionBackend;
use crate::generate::random_graph;
use crate::simulation::{PageRankSimulation, SimulationSettings, VerifyMode};

/// Campaign-level configuration: how many graphs, of what size, from which
/// seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Number of counted trials.
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Nodes per generated graph.
    #[serde(default = "default_node_count")]
    pub node_count: usize,
    /// Edges per generated graph.
    #[serde(default = "default_edge_count")]
    pub edge_count: usize,
    /// Seed of the graph generator; the same seed replays the same graphs.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Regenerations allowed for a single run before the campaign gives up.
    /// `None` retries forever.
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: Option<usize>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            node_count: default_node_count(),
            edge_count: default_edge_count(),
            seed: default_seed(),
            max_regenerations: default_max_regenerations(),
        }
    }
}

const fn default_runs() -> usize {
    10
}

const fn default_node_count() -> usize {
    400
}

const fn default_edge_count() -> usize {
    600
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_regenerations() -> Option<usize> {
    Some(100)
}

impl CampaignConfig {
    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            bail!("runs must be > 0");
        }
        if self.node_count == 0 {
            bail!("node_count must be > 0");
        }
        if self.edge_count < self.node_count {
            bail!(
                "edge_count ({}) must be >= node_count ({}) so every node has an outgoing edge",
                self.edge_count,
                self.node_count
            );
        }
        match self.node_count.checked_mul(self.node_count) {
            Some(max) if self.edge_count <= max => Ok(()),
            _ => bail!(
                "edge_count ({}) exceeds node_count^2 for node_count {}",
                self.edge_count,
                self.node_count
            ),
        }
    }
}

/// A counted trial that did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialFailure {
    /// 0-based run index.
    pub run: usize,
    /// Error message, or `None` when the trial ran and reported incorrect
    /// ranks.
    pub error: Option<String>,
}

/// Aggregate report produced by a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Configured number of runs.
    pub runs: usize,
    /// Runs that produced a verdict.
    pub completed: usize,
    pub passed: usize,
    pub failed: usize,
    /// Graphs discarded because the reference did not converge.
    pub regenerations: usize,
    pub failures: Vec<TrialFailure>,
    /// Run at which the regeneration budget ran out, if any.
    pub abandoned_run: Option<usize>,
}

impl CampaignReport {
    /// True if every configured run completed and passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty() && self.abandoned_run.is_none() && self.passed == self.runs
    }

    /// One-line `passed/total` summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Finished robustness test with {}/{} passed.",
            self.passed, self.runs
        )
    }
}

/// Run a campaign: one generated graph per run, regenerated while the trial
/// reports [`RankError::NoConvergence`].
///
/// `trial` returns `Ok(true)` for a pass and `Ok(false)` for incorrect
/// ranks. Any other error counts as a failed run with its message recorded.
///
/// # Errors
///
/// Returns an error if config validation fails.
#[instrument(skip(config, trial), fields(runs = config.runs, seed = config.seed))]
pub fn run_campaign<F>(config: &CampaignConfig, mut trial: F) -> Result<CampaignReport>
where
    F: FnMut(&Graph) -> Result<bool>,
{
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut report = CampaignReport {
        runs: config.runs,
        completed: 0,
        passed: 0,
        failed: 0,
        regenerations: 0,
        failures: Vec::new(),
        abandoned_run: None,
    };

    'runs: for run in 0..config.runs {
        let mut attempts = 0_usize;
        let outcome = loop {
            let graph = random_graph(config.node_count, config.edge_count, &mut rng)?;
            match trial(&graph) {
                Err(err) if RankError::is_no_convergence(&err) => {
                    report.regenerations += 1;
                    attempts += 1;
                    warn!(run, attempts, "reference did not converge, regenerating graph");
                    if config.max_regenerations.is_some_and(|cap| attempts > cap) {
                        warn!(run, attempts, "regeneration budget exhausted, abandoning campaign");
                        report.abandoned_run = Some(run);
                        break 'runs;
                    }
                }
                other => break other,
            }
        };

        report.completed += 1;
        match outcome {
            Ok(true) => {
                report.passed += 1;
                info!(run, "trial passed");
            }
            Ok(false) => {
                report.failed += 1;
                warn!(run, "trial produced incorrect ranks");
                report.failures.push(TrialFailure { run, error: None });
            }
            Err(err) => {
                report.failed += 1;
                warn!(run, error = %err, "trial failed");
                report.failures.push(TrialFailure {
                    run,
                    error: Some(format!("{err:#}")),
                });
            }
        }
    }

    info!("{}", report.summary());
    Ok(report)
}

/// The standard trial: simulate the graph on `backend` and verify the ranks
/// against the reference.
pub fn verify_trial<'a, B: ExecutionBackend>(
    backend: &'a mut B,
    settings: &'a SimulationSettings,
    verify: VerifyMode,
) -> impl FnMut(&Graph) -> Result<bool> + 'a {
    move |graph: &Graph| {
        let simulation = PageRankSimulation::new(graph, settings.clone())?;
        Ok(simulation.run(&mut *backend, verify)?.is_correct)
    }
}

/// [`verify_trial`] that hands the backend to `on_pause` after every clean
/// run, before teardown.
pub fn pausing_trial<'a, B: ExecutionBackend>(
    backend: &'a mut B,
    settings: &'a SimulationSettings,
    verify: VerifyMode,
    on_pause: &'a mut dyn FnMut(&B) -> Result<()>,
) -> impl FnMut(&Graph) -> Result<bool> + 'a {
    move |graph: &Graph| {
        let simulation = PageRankSimulation::new(graph, settings.clone())?;
        Ok(simulation
            .run_pausing(&mut *backend, verify, &mut *on_pause)?
            .is_correct)
    }
}
