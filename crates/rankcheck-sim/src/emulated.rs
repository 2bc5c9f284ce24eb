//! In-process backend that runs the fixed-point engine itself.
//!
//! Useful wherever real hardware is not available: the binaries, the
//! integration tests and calibration dry runs. Timing pressure is modelled
//! by dropping packets: below `min_safe_time_scale_factor` a deterministic
//! share `(min_safe - tsf) / min_safe` of packets never arrives, which shows
//! up in the provenance counters and raises the warning flag. The first
//! packet of every iteration is always among the dropped ones, so any
//! timing value below the safe one warns and every value at or above it is
//! clean.

use std::collections::BTreeMap;

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rankcheck_core::rank::RankVector;
use rankcheck_core::reference::ReferenceEngine;

use crate::backend::{BackendParams, ExecutionBackend, GraphParams};

/// Emulated machine characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulationConfig {
    /// Smallest timing value at which no packet is dropped.
    /// Default: 40.
    #[serde(default = "default_min_safe_time_scale_factor")]
    pub min_safe_time_scale_factor: u32,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            min_safe_time_scale_factor: default_min_safe_time_scale_factor(),
        }
    }
}

const fn default_min_safe_time_scale_factor() -> u32 {
    40
}

const SENT: &str = "total_multi_cast_sent_packets";
const CREATED: &str = "total_created_packets";
const DROPPED: &str = "total_dropped_packets";
const MISSED: &str = "total_missed_dropped_packets";
const LOST: &str = "total_lost_dropped_packets";

/// Emulated execution backend.
#[derive(Debug, Clone, Default)]
pub struct EmulatedBackend {
    config: EmulationConfig,
    params: Option<BackendParams>,
    engine: Option<ReferenceEngine>,
    initial: RankVector,
    history: Vec<RankVector>,
    counters: BTreeMap<&'static str, u64>,
    warned: bool,
    active: bool,
    setups: usize,
    teardowns: usize,
    runs: usize,
}

impl EmulatedBackend {
    #[must_use]
    pub fn new(config: EmulationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EmulationConfig {
        &self.config
    }

    /// Number of `simulation_setup` calls so far.
    #[must_use]
    pub const fn setup_count(&self) -> usize {
        self.setups
    }

    /// Number of `simulation_teardown` calls so far.
    #[must_use]
    pub const fn teardown_count(&self) -> usize {
        self.teardowns
    }

    /// Number of completed `simulation_run` calls.
    #[must_use]
    pub const fn run_count(&self) -> usize {
        self.runs
    }

    /// True between setup and teardown.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Parameters of the current (or last) setup.
    #[must_use]
    pub const fn last_params(&self) -> Option<&BackendParams> {
        self.params.as_ref()
    }

    /// Out of every `min_safe_time_scale_factor` packets, how many drop.
    fn deficit(&self, time_scale_factor: u32) -> u64 {
        u64::from(
            self.config
                .min_safe_time_scale_factor
                .saturating_sub(time_scale_factor),
        )
    }
}

/// splitmix64 finaliser over the packet coordinates.
fn packet_hash(iteration: usize, source: usize, target: usize) -> u64 {
    let mut z = (iteration as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((source as u64).rotate_left(21))
        .wrapping_add((target as u64).rotate_left(42));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl ExecutionBackend for EmulatedBackend {
    fn simulation_setup(&mut self, params: &BackendParams) -> Result<()> {
        ensure!(!self.active, "emulated backend is already set up");
        ensure!(
            params.timestep_ms > 0.0,
            "timestep_ms must be > 0, got {}",
            params.timestep_ms
        );
        self.setups += 1;
        self.active = true;
        self.params = Some(params.clone());
        self.engine = None;
        self.history.clear();
        self.counters.clear();
        self.warned = false;
        debug!(setups = self.setups, "emulated backend set up");
        Ok(())
    }

    fn build_graph(
        &mut self,
        node_ids: &[usize],
        edges: &[(usize, usize)],
        params: &GraphParams,
    ) -> Result<()> {
        ensure!(self.active, "build_graph called before setup");
        ensure!(
            params.vertices.len() == node_ids.len(),
            "{} vertex parameter sets for {} nodes",
            params.vertices.len(),
            node_ids.len()
        );
        if let Some(&(s, t)) = edges
            .iter()
            .find(|&&(s, t)| s >= node_ids.len() || t >= node_ids.len())
        {
            bail!("edge ({s}, {t}) refers to an unknown node");
        }

        self.engine = Some(ReferenceEngine::from_edges(
            node_ids.len(),
            edges,
            params.damping,
        ));
        self.initial = params.vertices.iter().map(|v| v.rank_init).collect();
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn simulation_run(&mut self, duration_ms: f64) -> Result<()> {
        let (Some(params), Some(engine)) = (&self.params, &self.engine) else {
            bail!("simulation_run called before setup and build_graph");
        };
        ensure!(
            duration_ms >= 0.0,
            "run duration must be >= 0, got {duration_ms}"
        );

        let iterations = (duration_ms / params.timestep_ms).round() as usize;
        let min_safe = u64::from(self.config.min_safe_time_scale_factor.max(1));
        let deficit = self.deficit(params.time_scale_factor);

        let mut created = 0_u64;
        let mut dropped = 0_u64;
        let mut history = Vec::with_capacity(iterations + 1);
        let mut ranks = self.initial.clone();

        for iteration in 0..iterations {
            let mut ordinal = 0_usize;
            let (next, lost) = engine.step_filtered(&ranks, |source, target| {
                let first = ordinal == 0;
                ordinal += 1;
                deficit == 0
                    || !(first || packet_hash(iteration, source, target) % min_safe < deficit)
            });
            created += ordinal as u64;
            dropped += lost as u64;
            history.push(std::mem::replace(&mut ranks, next));
        }
        history.push(ranks);

        self.counters.insert(CREATED, created);
        self.counters.insert(SENT, created - dropped);
        self.counters.insert(DROPPED, dropped);
        self.counters.insert(MISSED, 0);
        self.counters.insert(LOST, dropped);
        self.warned = dropped > 0;
        self.history = history;
        self.runs += 1;

        info!(
            iterations,
            time_scale_factor = params.time_scale_factor,
            created,
            dropped,
            "emulated run complete"
        );
        Ok(())
    }

    fn extract_ranks(&self) -> Result<Vec<RankVector>> {
        ensure!(!self.history.is_empty(), "no completed run to extract ranks from");
        Ok(self.history.clone())
    }

    fn extract_provenance(&self, names: &[String]) -> Result<BTreeMap<String, u64>> {
        Ok(names
            .iter()
            .map(|name| {
                let value = self.counters.get(name.as_str()).copied().unwrap_or(0);
                (name.clone(), value)
            })
            .collect())
    }

    fn produced_warnings(&self) -> Result<bool> {
        Ok(self.warned)
    }

    fn simulation_teardown(&mut self) -> Result<()> {
        self.teardowns += 1;
        self.active = false;
        self.engine = None;
        debug!(teardowns = self.teardowns, "emulated backend torn down");
        Ok(())
    }
}
