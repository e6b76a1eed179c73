//! hpmc CLI - Command Line Driver for Hard-Particle Monte Carlo
//!
//! Operational entry point for the HPMC update engine.
//!
//! # Commands
//!
//! - `hpmc run --config run.toml [--sweeps N]` - Run sweeps on a lattice and print counters
//! - `hpmc check --config run.toml` - Validate a run configuration without sweeping
//!
//! # Architecture
//!
//! As part of the service layer, this crate loads a TOML run description,
//! builds the particle system and neighbour cells, and drives the
//! integrator from `hpmc_engine`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

/// Hard-particle Monte Carlo driver
#[derive(Parser)]
#[command(name = "hpmc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run configuration file path
    #[arg(short, long, global = true, default_value = "run.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run sweeps and print move and insertion statistics
    Run {
        /// Number of sweeps, overriding the configuration file
        #[arg(short, long)]
        sweeps: Option<u64>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Validate the run configuration and system geometry
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Run { sweeps, format } => commands::run::run(&cli.config, sweeps, &format),
        Commands::Check => commands::check::run(&cli.config),
    }
}
