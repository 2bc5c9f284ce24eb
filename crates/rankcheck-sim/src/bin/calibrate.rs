#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rankcheck_sim::logging::init_tracing;
use rankcheck_sim::{
    EmulatedBackend, PageRankSimulation, SimConfig, VerifyMode, calibrate_backend_with,
    load_config, wait_for_enter,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find the smallest time_scale_factor that runs PageRank cleanly",
    long_about = None
)]
struct Cli {
    /// TOML config file; a missing file means built-in defaults
    #[arg(default_value = "rankcheck.toml")]
    config: PathBuf,

    /// Tab-separated edge list to calibrate on instead of a random graph
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Nodes of the random graph
    #[arg(long)]
    nodes: Option<usize>,

    /// Edges of the random graph
    #[arg(long)]
    edges: Option<usize>,

    /// Random graph seed
    #[arg(long)]
    seed: Option<u64>,

    /// Known failing time_scale_factor
    #[arg(short, long)]
    lower: Option<u32>,

    /// Known passing time_scale_factor; skips range finding
    #[arg(short, long)]
    upper: Option<u32>,

    /// Stop width: absolute when >= 1, a fraction of the midpoint when < 1
    #[arg(long)]
    resolution: Option<f64>,

    /// Compare every run against the fixed-point reference
    #[arg(short, long)]
    verify: bool,

    /// Hold the backend after each clean run until Enter is pressed
    #[arg(short, long)]
    pause: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, config: &mut SimConfig) {
        if let Some(path) = &self.graph {
            config.graph.path = Some(path.clone());
        }
        if let Some(nodes) = self.nodes {
            config.campaign.node_count = nodes;
        }
        if let Some(edges) = self.edges {
            config.campaign.edge_count = edges;
        }
        if let Some(seed) = self.seed {
            config.campaign.seed = seed;
        }
        if let Some(lower) = self.lower {
            config.calibration.lower = lower;
        }
        if self.upper.is_some() {
            config.calibration.upper = self.upper;
        }
        if let Some(resolution) = self.resolution {
            config.calibration.resolution = resolution;
        }
    }

    fn verify_mode(&self) -> VerifyMode {
        if self.verify {
            VerifyMode::default()
        } else {
            VerifyMode::Skip
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    cli.apply(&mut config);

    let graph = config.load_graph()?;
    let simulation = PageRankSimulation::new(&graph, config.simulation.clone())?;

    let mut backend = EmulatedBackend::new(config.emulation.clone());
    let mut hold = |_: &EmulatedBackend| wait_for_enter();
    let on_pause: Option<&mut dyn FnMut(&EmulatedBackend) -> Result<()>> =
        if cli.pause { Some(&mut hold) } else { None };
    let report = calibrate_backend_with(
        &mut backend,
        &simulation,
        &config.calibration,
        cli.verify_mode(),
        on_pause,
    )?;

    println!("==> RESULT: time_scale_factor={}", report.value);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
