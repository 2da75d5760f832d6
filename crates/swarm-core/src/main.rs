//! Swarm Simulation CLI
//!
//! Single runs and bandwidth sweeps. Results are printed as JSON on stdout;
//! logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use swarm_core::batch::{self, DEFAULT_RUNS};
use swarm_core::{output, CancelToken, Engine, EventLog, SimConfig, SimError};

#[derive(Parser)]
#[command(name = "swarm_sim")]
#[command(about = "Bandwidth-constrained swarm coordination experiments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Random seed (overrides the config file)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Ticks per episode (overrides the config file)
    #[arg(long, global = true)]
    ticks: Option<u64>,

    /// Episodes per run (overrides the config file)
    #[arg(long, global = true)]
    episodes: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation and print its summary.
    Run {
        /// Per-tick bit budget
        #[arg(long, conflicts_with = "unconstrained")]
        bandwidth: Option<u64>,
        /// Remove the bit budget entirely
        #[arg(long)]
        unconstrained: bool,
        /// Write per-tick records to this JSONL file
        #[arg(long)]
        events: Option<PathBuf>,
        /// Also write the summary JSON to this file
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Write the final world snapshot to this file
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Sweep the bit budget, several seeds per setting.
    Sweep {
        /// Budgets in bits (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "100,1000,10000")]
        bandwidths: Vec<u64>,
        /// Add an unconstrained setting after the listed budgets
        #[arg(long)]
        include_unconstrained: bool,
        /// Runs per setting
        #[arg(long, default_value_t = DEFAULT_RUNS)]
        runs: u32,
        /// Output file for results (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<SimConfig, SimError> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(ticks) = cli.ticks {
        config.ticks_per_episode = ticks;
    }
    if let Some(episodes) = cli.episodes {
        config.episode_count = episodes;
    }
    Ok(config)
}

fn execute(cli: Cli) -> Result<(), SimError> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            bandwidth,
            unconstrained,
            events,
            summary,
            snapshot,
        } => {
            if unconstrained {
                config.bandwidth_bits = None;
            } else if bandwidth.is_some() {
                config.bandwidth_bits = bandwidth;
            }

            let log = match &events {
                Some(path) => EventLog::jsonl(path)?,
                None => EventLog::null(),
            };
            let mut engine = Engine::new(config, log)?;
            let result = engine.run_episodes(&CancelToken::new())?;
            engine.finish()?;
            if let Some(path) = &events {
                info!("wrote {} records to {}", engine.log().record_count(), path.display());
            }

            if let Some(path) = summary {
                engine.write_summary(&path)?;
                info!("wrote summary to {}", path.display());
            }
            if let Some(path) = snapshot {
                output::write_snapshot(&engine.snapshot(), &path)?;
                info!("wrote snapshot to {}", path.display());
            }
            println!("{}", result.to_json_pretty()?);
        }

        Commands::Sweep {
            bandwidths,
            include_unconstrained,
            runs,
            output,
        } => {
            let mut budgets: Vec<Option<u64>> = bandwidths.into_iter().map(Some).collect();
            if include_unconstrained {
                budgets.push(None);
            }
            info!(settings = budgets.len(), runs, "starting sweep");

            let results = batch::sweep_bandwidth(&config, &budgets, runs)?;
            if let Some(best) = batch::best_performer(&results) {
                info!(
                    "best setting: {} (mean efficiency {:.3})",
                    best.label, best.aggregated.efficiency.mean
                );
            }

            let json = serde_json::to_string_pretty(&results)?;
            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &json)?;
                info!("results saved to {}", path.display());
            }
            println!("{}", json);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
