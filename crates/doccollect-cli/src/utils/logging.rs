//! Logging initialization.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

/// Initialize the logging subsystem based on CLI flags.
///
/// Logs go to stderr. JSON output lowers the default level to errors so
/// stdout stays parseable, unless `--verbose` was given.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = log_level(cli);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn log_level(cli: &Cli) -> Level {
    if cli.verbose {
        Level::DEBUG
    } else if cli.quiet || cli.format().is_some_and(|f| f.is_machine()) {
        Level::ERROR
    } else {
        Level::WARN
    }
}
