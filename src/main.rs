use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use photosweep::classify::TransferKind;
use photosweep::sweep_config::SweepConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "photosweep")]
#[command(version, about = "Photo triage workflow engine")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Log filter directive (overrides sweep.toml and PHOTOSWEEP_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a scripted session against an in-memory library
    Simulate {
        /// Library fixture (JSON)
        #[arg(long)]
        library: PathBuf,

        /// Intent script (JSON array)
        #[arg(long)]
        intents: PathBuf,

        /// Album transfer kind: copy, move
        #[arg(long)]
        transfer: Option<TransferKind>,
    },
    /// Show the stage sequence for a preference setting
    Stages {
        /// Assign albums while swiping
        #[arg(long)]
        classify_on_swipe: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default sweep.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let transfer = match &cli.command {
        Commands::Simulate { transfer, .. } => *transfer,
        _ => None,
    };
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| cli.verbose.then(|| "debug".to_string()));
    let config = SweepConfig::with_cli_args(project_dir, transfer, log_level)?;
    let _log_guard = photosweep::logging::init(&config.logging())?;

    match &cli.command {
        Commands::Simulate {
            library, intents, ..
        } => cmd::cmd_simulate(&config, library, intents).await?,
        Commands::Stages { classify_on_swipe } => cmd::cmd_stages(*classify_on_swipe),
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
