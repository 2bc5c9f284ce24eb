//! TOML configuration shared by the binaries.
//!
//! Every section and field is optional:
//!
//! ```toml
//! [simulation]
//! run_time_ms = 10.0
//! fail_on_warning = false
//!
//! [simulation.params]
//! time_scale_factor = 40
//!
//! [campaign]
//! runs = 10
//! node_count = 400
//! edge_count = 600
//!
//! [calibration]
//! resolution = 1.0
//!
//! [emulation]
//! min_safe_time_scale_factor = 40
//!
//! [graph]
//! path = "web-Google.txt"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use rankcheck_core::graph::Graph;

use crate::calibrate::CalibrationConfig;
use crate::campaign::CampaignConfig;
use crate::emulated::EmulationConfig;
use crate::generate::random_graph;
use crate::simulation::SimulationSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub emulation: EmulationConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Where the calibrated graph comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphConfig {
    /// Edge-list file. `None` generates a random graph from the campaign
    /// sizes and seed.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SimConfig {
    /// The single graph a calibration runs on: the `[graph]` edge list when
    /// set, otherwise a random graph from the campaign sizes and seed.
    ///
    /// # Errors
    ///
    /// Fails if the edge list cannot be loaded or the sizes are invalid.
    pub fn load_graph(&self) -> Result<Graph> {
        if let Some(path) = &self.graph.path {
            return load_edge_list(path);
        }
        let mut rng = StdRng::seed_from_u64(self.campaign.seed);
        Ok(random_graph(
            self.campaign.node_count,
            self.campaign.edge_count,
            &mut rng,
        )?)
    }
}

/// Load a config file. A missing file yields the defaults.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    if !path.exists() {
        return Ok(SimConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<SimConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load a tab-separated edge list (SNAP format): one `source<TAB>target`
/// pair per line, `#` comment lines and blank lines ignored. Labels are
/// taken verbatim and inferred from the edges.
///
/// # Errors
///
/// Fails if the file cannot be read or a line does not hold two fields.
pub fn load_edge_list(path: &Path) -> Result<Graph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_edge_list(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse edge-list text; see [`load_edge_list`].
///
/// # Errors
///
/// Fails on the first line that does not hold exactly two fields.
pub fn parse_edge_list(content: &str) -> Result<Graph> {
    let mut edges = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(source), Some(target), None) => {
                edges.push((source.to_string(), target.to_string()));
            }
            _ => bail!(
                "line {}: expected `source<TAB>target`, got {line:?}",
                index + 1
            ),
        }
    }
    Ok(Graph::new(edges))
}
