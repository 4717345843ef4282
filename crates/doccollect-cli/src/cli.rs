//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # Collect documents, two at a time
//! doccollect fetch https://example.com/a.pdf https://example.com/b.pdf --concurrency 2
//!
//! # Inspect the lineage of a URL
//! doccollect status https://example.com/a.pdf
//!
//! # Show the effective configuration
//! doccollect --data-dir /srv/docs config
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Main CLI structure for the `doccollect` command
#[derive(Parser, Clone, Debug)]
#[command(name = "doccollect")]
#[command(version)]
#[command(about = "doccollect - Fetch, deduplicate and version documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file (overrides autodiscovery). Also via `DOCCOLLECT_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "DOCCOLLECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage root holding raw/, metadata/ and version_index.json. Also via `DOCCOLLECT_DATA_DIR`.
    #[arg(long = "data-dir", global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Download documents and store new content and versions
    Fetch {
        /// Document URLs
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Number of URLs fetched at once
        #[arg(short = 'c', long, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: Option<u16>,

        /// Give up on a URL after this many seconds, retries included
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,

        /// Extra attempts after a transient failure
        #[arg(long)]
        max_retries: Option<u32>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the recorded version lineage for a URL (or source host)
    Status {
        /// Lineage key, usually the document URL
        key: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    /// Output format of the selected command, if it has one.
    pub const fn format(&self) -> Option<OutputFormat> {
        match &self.command {
            Commands::Fetch { format, .. } | Commands::Status { format, .. } => Some(*format),
            Commands::Config => None,
        }
    }
}
