#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rankcheck_sim::logging::init_tracing;
use rankcheck_sim::{
    EmulatedBackend, SimConfig, VerifyMode, load_config, pausing_trial, run_campaign,
    verify_trial, wait_for_enter,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run PageRank on many random graphs and count correct results",
    long_about = None
)]
struct Cli {
    /// TOML config file; a missing file means built-in defaults
    #[arg(default_value = "rankcheck.toml")]
    config: PathBuf,

    /// Number of counted runs
    #[arg(short, long)]
    runs: Option<usize>,

    /// Nodes per generated graph
    #[arg(long)]
    nodes: Option<usize>,

    /// Edges per generated graph
    #[arg(long)]
    edges: Option<usize>,

    /// Graph generator seed
    #[arg(long)]
    seed: Option<u64>,

    /// Timing value used by every run
    #[arg(short, long)]
    time_scale_factor: Option<u32>,

    /// Compare backend ranks against the fixed-point reference
    #[arg(short, long)]
    verify: bool,

    /// Hold the backend after each run until Enter is pressed
    #[arg(short, long)]
    pause: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, config: &mut SimConfig) {
        if let Some(runs) = self.runs {
            config.campaign.runs = runs;
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
        if let Some(tsf) = self.time_scale_factor {
            config.simulation.params.time_scale_factor = tsf;
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

    let verify = cli.verify_mode();
    let mut backend = EmulatedBackend::new(config.emulation.clone());
    let report = if cli.pause {
        let mut hold = |_: &EmulatedBackend| wait_for_enter();
        run_campaign(
            &config.campaign,
            pausing_trial(&mut backend, &config.simulation, verify, &mut hold),
        )?
    } else {
        run_campaign(
            &config.campaign,
            verify_trial(&mut backend, &config.simulation, verify),
        )?
    };

    println!("{}", report.summary());
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
