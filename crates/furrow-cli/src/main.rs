// crates/furrow-cli/src/main.rs
//
// CLI entrypoint for the Furrow liquidity-mining engine.
//
// Provides subcommands for inspecting the halving schedule, replaying a
// scripted AMM event log through the reward engine, and querying pending
// rewards from a persisted engine database.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use commands::pending::PendingCmd;
use commands::replay::ReplayCmd;
use config::FurrowConfig;
use output::OutputFormat;

/// Furrow CLI: halving-emission liquidity-mining rewards.
#[derive(Parser, Debug)]
#[command(
    name = "furrow",
    version = "0.1.0",
    about = "Furrow liquidity-mining reward engine: schedules, replays, and reward queries"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "furrow.toml")]
    config: String,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the halving schedule: periods, rates, and where the supply cap binds.
    Schedule,

    /// Replay a TOML event log through the engine.
    Replay(ReplayCmd),

    /// Query a position's pending reward from a persisted database.
    Pending(PendingCmd),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found. Logging is set up first so the outcome can be reported.
    let loaded = FurrowConfig::load(&cli.config);
    let log_level = match &loaded {
        Ok(cfg) => cfg.log_level.clone(),
        Err(_) => FurrowConfig::default().log_level,
    };

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match loaded {
        Ok(cfg) => {
            tracing::info!("Loaded configuration from {}", cli.config);
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "Could not load config from {}: {}. Using defaults.",
                cli.config,
                e
            );
            FurrowConfig::default()
        }
    };

    match &cli.command {
        Commands::Schedule => commands::schedule::run(&config, cli.format)?,
        Commands::Replay(cmd) => commands::replay::run(cmd, &config, cli.format)?,
        Commands::Pending(cmd) => commands::pending::run(cmd, cli.format)?,
    }

    Ok(())
}
