//! Ember - script plugin host.
//!
//! Runs a plugin manager on a single-threaded tick loop. Administrative and
//! host-simulation commands are read from stdin.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ember_config::HostConfig;
use ember_telemetry::{LogConfig, setup_logging};

mod commands;
mod console;

/// Ember - script plugin host
#[derive(Parser)]
#[command(name = "ember")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "EMBER_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin root directory (overrides the config file)
    #[arg(long, global = true)]
    plugin_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host loop
    Run {
        /// Tick interval in milliseconds (overrides the config file)
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Load a single plugin and report whether it loads cleanly
    Check {
        /// Plugin directory name under the plugin root
        dir: String,
    },
}

fn load_config(cli: &Cli) -> Result<HostConfig> {
    let mut config = HostConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(root) = &cli.plugin_root {
        config.plugins.root.clone_from(root);
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    let mut log_config = LogConfig::from_section(&config.logging);
    if cli.verbose {
        log_config.level = "debug".to_string();
    }
    // Held until exit so buffered file output is flushed.
    let _guard = match setup_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        },
    };

    match cli.command {
        Commands::Run { tick_ms } => {
            if let Some(ms) = tick_ms {
                config.host.tick_interval_ms = ms.max(1);
            }
            commands::run::run_host(config).await
        },
        Commands::Check { dir } => commands::check::check_plugin(config, &dir),
    }
}
