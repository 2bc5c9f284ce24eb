//! Provenance sweep: how packet counters change with the timing value.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::backend::ExecutionBackend;
use crate::simulation::{PageRankSimulation, VerifyMode};

/// Counters observed at one timing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub time_scale_factor: u32,
    pub counters: BTreeMap<String, u64>,
}

/// Run one full session per entry of `timing_values` and collect the
/// `names` counters of each.
///
/// Warnings are recorded, not raised, and ranks are not verified.
///
/// # Errors
///
/// Propagates the first backend error, annotated with its timing value.
#[instrument(skip_all, fields(points = timing_values.len()))]
pub fn provenance_sweep<B: ExecutionBackend>(
    backend: &mut B,
    simulation: &PageRankSimulation,
    timing_values: &[u32],
    names: &[String],
) -> Result<Vec<SweepPoint>> {
    let base = simulation.tolerating_warnings().with_provenance_names(names);

    timing_values
        .iter()
        .map(|&time_scale_factor| {
            let verification = base
                .with_time_scale_factor(time_scale_factor)
                .run(&mut *backend, VerifyMode::Skip)
                .with_context(|| format!("sweep failed at time_scale_factor={time_scale_factor}"))?;
            info!(time_scale_factor, counters = ?verification.provenance, "sweep point");
            Ok(SweepPoint {
                time_scale_factor,
                counters: verification.provenance,
            })
        })
        .collect()
}
