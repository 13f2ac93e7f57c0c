//! scopemux - replay scoped-state scenarios
//!
//! Builds a store from the YAML configuration, runs a scenario file against
//! it and prints every captured snapshot.

use anyhow::{Context, Result};
use clap::Parser;
use scopemux::replay::{Replay, Scenario};
use scopemux::MuxConfig;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

const DEFAULT_CONFIG: &str = "scopemux.yaml";

/// scopemux - many instances of one transition function, side by side
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Log level (error, warn, info, debug, trace), overrides the config file
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Scenario file to replay
    #[arg(short, long)]
    scenario: Option<String>,

    /// List built-in transition functions
    #[arg(long)]
    list_builtins: bool,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.list_builtins {
        cli::print_builtins();
        return Ok(());
    }

    let (config, from_file) = load_config(&args.config)?;
    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level))?;

    if from_file {
        info!("Configuration file: {}", args.config);
    } else {
        warn!("{} not found, using built-in defaults", args.config);
    }

    let path = args
        .scenario
        .context("No scenario given (use --scenario <file>)")?;
    let scenario = Scenario::load(&path)?;
    info!("Replaying {} step(s) from {}", scenario.steps.len(), path);

    let mut replay = Replay::new(&config)?;
    let snapshots = replay.run(&scenario)?;

    for snapshot in &snapshots {
        cli::print_snapshot(snapshot)?;
    }
    cli::print_summary(replay.store());

    Ok(())
}

/// Load the config file; a missing default file falls back to defaults
fn load_config(path: &str) -> Result<(MuxConfig, bool)> {
    if path == DEFAULT_CONFIG && !Path::new(path).exists() {
        return Ok((MuxConfig::default(), false));
    }
    Ok((MuxConfig::load(path)?, true))
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
