//! rankcheck-sim library.
//!
//! Drives PageRank runs on an [`ExecutionBackend`], calibrates the timing
//! value a backend needs, and runs robustness campaigns over random graphs.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types. Conditions callers
//!   branch on travel inside as [`rankcheck_core::RankError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod backend;
pub mod calibrate;
pub mod campaign;
pub mod config;
pub mod emulated;
pub mod generate;
pub mod logging;
pub mod session;
pub mod simulation;
pub mod sweep;

pub use backend::{BackendParams, ExecutionBackend, GraphParams, VertexParams};
pub use calibrate::{
    CalibrationConfig, CalibrationReport, calibrate, calibrate_backend, calibrate_backend_with,
};
pub use campaign::{CampaignConfig, CampaignReport, pausing_trial, run_campaign, verify_trial};
pub use config::{GraphConfig, SimConfig, load_config, load_edge_list};
pub use emulated::{EmulatedBackend, EmulationConfig};
pub use generate::random_graph;
pub use session::{BackendSession, PausedSession, wait_for_enter};
pub use simulation::{PageRankSimulation, SimulationSettings, Verification, VerifyMode};
pub use sweep::{SweepPoint, provenance_sweep};
