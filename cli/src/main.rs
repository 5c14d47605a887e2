//! deepfreeze CLI - binary entry point.
//!
//! ```text
//! main() -> Cli::parse() -> Services::connect(config) -> commands::run()
//! ```
//!
//! Every command exits non-zero when the operation was rejected or failed.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use deepfreeze_config::DeepfreezeConfig;
use deepfreeze_types::UnitId;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No writable log file: stderr keeps stdout clean for command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.deepfreeze/logs/deepfreeze.log
    if let Some(config_path) = DeepfreezeConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("deepfreeze.log"));
    }

    // Fallback: ./.deepfreeze/logs/deepfreeze.log
    candidates.push(PathBuf::from(".deepfreeze").join("logs").join("deepfreeze.log"));

    candidates
}

#[derive(Debug, Parser)]
#[command(name = "deepfreeze")]
#[command(about = "Suspend, resume, enforce and launch application units on a device")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Capability and ledger summary
    Status,
    /// List suspended units
    List,
    /// Suspend or resume a unit
    Toggle {
        #[arg(value_parser = parse_unit)]
        unit: UnitId,
    },
    /// Resume every suspended unit
    UnfreezeAll,
    /// Drop ledger entries for uninstalled units
    Prune,
    /// Enforce suspensions until Ctrl-C
    Monitor,
    /// Start a unit through the strategy chain
    Launch {
        #[arg(value_parser = parse_unit)]
        unit: UnitId,
    },
    /// Explain why a unit does not launch
    Troubleshoot {
        #[arg(value_parser = parse_unit)]
        unit: UnitId,
        /// Also try the alternative launch paths
        #[arg(long)]
        attempt: bool,
    },
}

fn parse_unit(raw: &str) -> Result<UnitId, String> {
    UnitId::new(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Usage errors exit with status 2, help and version with 0.
    let cli = Cli::try_parse().unwrap_or_else(|e| e.exit());

    init_tracing();

    let config = DeepfreezeConfig::load().ok().flatten().unwrap_or_default();
    let services = commands::Services::connect(&config).await?;
    let succeeded = commands::run(&services, cli.command).await?;

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
