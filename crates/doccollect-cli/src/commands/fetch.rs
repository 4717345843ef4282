//! Fetch command implementation

use anyhow::{Context, Result};
use doccollect_core::{CollectReport, Collector, Config};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::output::OutputFormat;

/// Run the pipeline over `urls` and print one line (or JSON object) per URL.
///
/// Returns `true` when every URL was collected.
pub async fn execute(config: &Config, urls: &[String], format: OutputFormat) -> Result<bool> {
    let collector = Collector::open(config).with_context(|| {
        format!(
            "Failed to open store at {}",
            config.paths.root.display()
        )
    })?;

    let cancel = CancellationToken::new();
    let guard = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling outstanding fetches");
                cancel.cancel();
            }
        })
    };

    let reports = collector
        .collect_all(urls, config.fetch.concurrency, &cancel)
        .await;
    guard.abort();

    match format {
        OutputFormat::Text => print_text(&reports),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    Ok(reports.iter().all(CollectReport::is_ok))
}

fn print_text(reports: &[CollectReport]) {
    let mut failed = 0usize;
    for report in reports {
        match &report.outcome {
            Ok(meta) => println!(
                "{:<12} v{:<3} {} -> {}",
                meta.dedup_decision.as_str(),
                meta.version,
                report.url,
                meta.storage_path.display()
            ),
            Err(err) => {
                failed += 1;
                println!("{:<12} {:<4} {}: {}", "failed", "", report.url, err);
            },
        }
    }
    println!(
        "{} collected, {} failed",
        reports.len() - failed,
        failed
    );
}
