//! Collection pipeline: fetch, fingerprint, classify, store.
//!
//! [`Collector`] wires a [`Fetcher`], a [`RawStore`] and a shared
//! [`VersionTracker`] together. New content and new versions are written to
//! the blob store; duplicates only get a metadata record pointing at the
//! existing blob.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetcher::{Fetcher, HttpTransport, Transport, deadline_after};
use crate::hash::compute_hash;
use crate::{DocumentMetadata, Error, FetchResult, RawStore, Result, VersionTracker};

/// Outcome of collecting one URL in a batch.
#[derive(Debug, Serialize)]
pub struct CollectReport {
    /// URL as given, trimmed
    pub url: String,
    /// Stored metadata record, or the error that stopped this URL
    #[serde(serialize_with = "serialize_outcome")]
    pub outcome: Result<DocumentMetadata>,
}

impl CollectReport {
    /// Whether this URL made it through the pipeline.
    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs the collection pipeline for single URLs and batches.
pub struct Collector<T = HttpTransport> {
    fetcher: Fetcher<T>,
    store: RawStore,
    tracker: Arc<VersionTracker>,
    deadline: Duration,
}

impl Collector<HttpTransport> {
    /// Open the store and index under `config.paths.root` and fetch over HTTP.
    pub fn open(config: &Config) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config.fetch)?;
        let store = RawStore::open(&config.paths.root)?;
        let tracker = Arc::new(VersionTracker::open(&config.paths.root)?);
        Ok(Self::new(fetcher, store, tracker, config.fetch.deadline()))
    }
}

impl<T: Transport> Collector<T> {
    /// Assemble a collector from its parts. `deadline` bounds each URL's fetch.
    pub fn new(
        fetcher: Fetcher<T>,
        store: RawStore,
        tracker: Arc<VersionTracker>,
        deadline: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            tracker,
            deadline,
        }
    }

    /// Blob and metadata store
    pub const fn store(&self) -> &RawStore {
        &self.store
    }

    /// Shared version index
    pub const fn tracker(&self) -> &Arc<VersionTracker> {
        &self.tracker
    }

    /// Collect one URL.
    pub async fn collect(&self, url: &str) -> Result<DocumentMetadata> {
        self.collect_with_cancel(url, &CancellationToken::new()).await
    }

    /// Collect one URL, aborting the fetch when `cancel` fires.
    pub async fn collect_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<DocumentMetadata> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidUrl("empty URL".into()));
        }

        let fetched = self
            .fetcher
            .fetch_with_cancel(url, cancel, deadline_after(self.deadline))
            .await?;

        // Index lock and fsyncs block; keep them off the async workers.
        let store = self.store.clone();
        let tracker = Arc::clone(&self.tracker);
        tokio::task::spawn_blocking(move || record_fetched(&store, &tracker, &fetched))
            .await
            .map_err(|e| Error::Storage {
                message: format!("record task failed: {e}"),
                path: self.store.root().to_path_buf(),
            })?
    }

    /// Classify a fetched document and persist it.
    ///
    /// Blocks on filesystem I/O; async callers go through
    /// [`collect_with_cancel`](Self::collect_with_cancel). An empty body is
    /// rejected before the version index is consulted, so a failed fetch never
    /// consumes a version number.
    pub fn record(&self, fetched: &FetchResult) -> Result<DocumentMetadata> {
        record_fetched(&self.store, &self.tracker, fetched)
    }

    /// Collect every non-blank URL with at most `concurrency` fetches in flight.
    ///
    /// Failures are isolated per URL. Reports come back in input order.
    pub async fn collect_all(
        &self,
        urls: &[String],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<CollectReport> {
        let mut reports: Vec<(usize, CollectReport)> = stream::iter(
            urls.iter()
                .map(|u| u.trim())
                .filter(|u| !u.is_empty())
                .enumerate(),
        )
        .map(|(idx, url)| async move {
            let outcome = self.collect_with_cancel(url, cancel).await;
            if let Err(err) = &outcome {
                warn!("Collecting {} failed ({}): {}", url, err.category(), err);
            }
            (
                idx,
                CollectReport {
                    url: url.to_string(),
                    outcome,
                },
            )
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

        reports.sort_by_key(|(idx, _)| *idx);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}

fn record_fetched(
    store: &RawStore,
    tracker: &VersionTracker,
    fetched: &FetchResult,
) -> Result<DocumentMetadata> {
    if fetched.body.is_empty() {
        return Err(Error::Precondition(format!(
            "{} returned an empty body",
            fetched.url
        )));
    }

    let hash = compute_hash(&fetched.body);
    let mut meta = DocumentMetadata::from_fetch(fetched);
    let decision = tracker.evaluate_document(&meta, &hash)?;
    meta.apply_decision(&hash, &decision);

    if decision.decision.stores_content() {
        let saved = store.save(&fetched.body, meta)?;
        info!(
            "Stored {} ({}) version {} -> {}",
            saved.url,
            saved.document_type,
            saved.version,
            saved.storage_path.display()
        );
        Ok(saved)
    } else {
        meta.storage_path = store.raw_path(&hash);
        let recorded = store.record_metadata(meta)?;
        info!(
            "Skipped duplicate {} (version {}, hash {})",
            recorded.url, recorded.version, hash
        );
        Ok(recorded)
    }
}

fn serialize_outcome<S: serde::Serializer>(
    outcome: &Result<DocumentMetadata>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(1))?;
    match outcome {
        Ok(meta) => map.serialize_entry("metadata", meta)?,
        Err(err) => map.serialize_entry(
            "error",
            &serde_json::json!({ "category": err.category(), "message": err.to_string() }),
        )?,
    }
    map.end()
}
