//! Execution backend contract.
//!
//! The backend is the external, stateful engine that actually runs the
//! message-passing PageRank (hardware, or [`crate::emulated::EmulatedBackend`]
//! in tests). It is always passed in explicitly and borrowed by exactly one
//! [`crate::session::BackendSession`] at a time.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use rankcheck_core::fixed::FixedPoint;
use rankcheck_core::rank::RankVector;
use rankcheck_core::reference::DampingTerms;

/// Router counters collected after every run unless configured otherwise.
pub const DEFAULT_PROVENANCE_NAMES: [&str; 5] = [
    "total_multi_cast_sent_packets",
    "total_created_packets",
    "total_dropped_packets",
    "total_missed_dropped_packets",
    "total_lost_dropped_packets",
];

/// Backend setup parameters.
///
/// One simulated millisecond on the machine takes `time_scale_factor` times
/// longer in real time; raising it gives the network more slack per
/// iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendParams {
    /// Interval between two timer ticks, in milliseconds.
    /// Default: 0.1.
    #[serde(default = "default_timestep_ms")]
    pub timestep_ms: f64,
    /// Real-time slow-down factor.
    /// Default: 10.
    #[serde(default = "default_time_scale_factor")]
    pub time_scale_factor: u32,
    /// Lower bound of the random back-off between two packets, in ms.
    /// Default: 0.1.
    #[serde(default = "default_delay_ms")]
    pub min_delay_ms: f64,
    /// Upper bound of the random back-off between two packets, in ms.
    /// Default: 0.1.
    #[serde(default = "default_delay_ms")]
    pub max_delay_ms: f64,
}

impl Default for BackendParams {
    fn default() -> Self {
        Self {
            timestep_ms: default_timestep_ms(),
            time_scale_factor: default_time_scale_factor(),
            min_delay_ms: default_delay_ms(),
            max_delay_ms: default_delay_ms(),
        }
    }
}

const fn default_timestep_ms() -> f64 {
    0.1
}

const fn default_time_scale_factor() -> u32 {
    10
}

const fn default_delay_ms() -> f64 {
    0.1
}

/// Per-vertex initial state handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexParams {
    pub rank_init: FixedPoint,
    /// In-degree.
    pub incoming: u32,
    /// Out-degree.
    pub outgoing: u32,
}

/// Everything besides topology that [`ExecutionBackend::build_graph`] needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphParams {
    /// Indexed by node id.
    pub vertices: Vec<VertexParams>,
    pub damping: DampingTerms,
    /// Vertices placed per processing core; `None` lets the backend decide.
    pub atoms_per_core: Option<usize>,
}

/// Operations the verification core needs from a backend.
///
/// Every call is blocking. Errors are genuine backend faults and are passed
/// through to callers unchanged; the only expected failure signal,
/// data-loss warnings, is reported by [`produced_warnings`](Self::produced_warnings).
pub trait ExecutionBackend {
    /// Configure and initialise the backend for one run.
    fn simulation_setup(&mut self, params: &BackendParams) -> Result<()>;

    /// Map the validated graph onto the backend.
    fn build_graph(
        &mut self,
        node_ids: &[usize],
        edges: &[(usize, usize)],
        params: &GraphParams,
    ) -> Result<()>;

    /// Run for `duration_ms` simulated milliseconds.
    fn simulation_run(&mut self, duration_ms: f64) -> Result<()>;

    /// Full iteration history; row 0 is the initial state.
    fn extract_ranks(&self) -> Result<Vec<RankVector>>;

    /// Named operational counters. Names the backend does not know map to 0.
    fn extract_provenance(&self, names: &[String]) -> Result<BTreeMap<String, u64>>;

    /// Whether the last run raised a data-loss warning.
    fn produced_warnings(&self) -> Result<bool>;

    /// Release backend resources. Must tolerate a partially failed setup.
    fn simulation_teardown(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_documented_values() {
        let p = BackendParams::default();
        assert!((p.timestep_ms - 0.1).abs() < f64::EPSILON);
        assert_eq!(p.time_scale_factor, 10);
        assert!((p.min_delay_ms - p.max_delay_ms).abs() < f64::EPSILON);
    }

    #[test]
    fn params_deserialize_with_partial_fields() {
        let p: BackendParams =
            serde_json::from_str(r#"{"time_scale_factor": 400}"#).expect("deserialize");
        assert_eq!(p.time_scale_factor, 400);
        assert!((p.timestep_ms - 0.1).abs() < f64::EPSILON);
    }
}
