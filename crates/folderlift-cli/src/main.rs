//! FolderLift CLI - Command-line interface for FolderLift
//!
//! Provides commands for:
//! - Uploading one folder tree, or every folder in a pending directory
//! - Inspecting and pruning the upload ledger
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand,
    config::ConfigCommand,
    ledger::LedgerCommand,
    upload::{UploadAllCommand, UploadCommand},
};
use folderlift_core::config::Config;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "folderlift",
    version,
    about = "Idempotent folder uploads to Google Drive"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload one local folder tree
    Upload(UploadCommand),
    /// Upload every folder inside a pending directory, smallest first
    UploadAll(UploadAllCommand),
    /// Inspect and manage the upload ledger
    #[command(subcommand)]
    Ledger(LedgerCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Setup tracing
    let filter = if cli.quiet {
        "warn".to_string()
    } else {
        match cli.verbose {
            0 => Config::load_or_default(&config_path).logging.level,
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let result = match cli.command {
        Commands::Upload(cmd) => cmd.execute(format, &config_path).await,
        Commands::UploadAll(cmd) => cmd.execute(format, &config_path).await,
        Commands::Ledger(cmd) => cmd.execute(format, &config_path).await,
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    };

    if let Err(ref e) = result {
        error!(error = %format!("{e:#}"), "Command failed");
    }
    result
}
