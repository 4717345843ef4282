//! doccollect CLI - fetch, deduplicate and version documents
//!
//! This is the main entry point for the doccollect command-line interface.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use doccollect_core::Config;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};
use utils::logging::initialize_logging;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let mut config =
        Config::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.paths.root.clone_from(dir);
    }

    let success = match cli.command {
        Commands::Fetch {
            urls,
            concurrency,
            deadline,
            max_retries,
            format,
        } => {
            apply_fetch_overrides(&mut config, concurrency, deadline, max_retries);
            commands::fetch_documents(&config, &urls, format).await?
        },
        Commands::Status { key, format } => commands::show_status(&config, &key, format)?,
        Commands::Config => {
            commands::show_config(&config)?;
            true
        },
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn apply_fetch_overrides(
    config: &mut Config,
    concurrency: Option<u16>,
    deadline: Option<u64>,
    max_retries: Option<u32>,
) {
    if let Some(n) = concurrency {
        config.fetch.concurrency = usize::from(n);
    }
    if let Some(secs) = deadline {
        config.fetch.deadline_secs = secs;
    }
    if let Some(n) = max_retries {
        config.fetch.max_retries = n;
    }
}
