//! # doccollect-core
//!
//! Core functionality for doccollect - a collector that downloads documents,
//! stores each distinct payload once and tracks how documents change over time.
//!
//! ## Architecture
//!
//! - **Fetching**: retrying HTTP downloads with bounded backoff, per-attempt
//!   timeouts and cancellation
//! - **Hashing**: SHA-256 fingerprints of document content
//! - **Raw store**: content-addressed blobs plus an append-only metadata log
//! - **Versioning**: per-URL lineage deciding between new, new version and duplicate
//! - **Collector**: the pipeline tying these together for one URL or a batch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doccollect_core::{Collector, Config, Result};
//!
//! # async fn run() -> Result<()> {
//! let config = Config::load()?;
//! let collector = Collector::open(&config)?;
//!
//! let meta = collector.collect("https://example.com/annual-report.pdf").await?;
//! println!("{} v{} -> {}", meta.dedup_decision, meta.version, meta.storage_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## On-disk Layout
//!
//! ```text
//! <root>/
//! ├── raw/<sha256>.bin                  # one blob per distinct payload
//! ├── metadata/<sha256>-<nanos>.json    # one record per fetch outcome
//! └── version_index.json                # lineage key -> latest hash and version
//! ```

/// Fetch, classify and store pipeline
pub mod collector;
/// Configuration loading and defaults
pub mod config;
/// Error types and result aliases
pub mod error;
/// HTTP fetching with retries and cancellation
pub mod fetcher;
/// Content fingerprints
pub mod hash;
/// Content-addressed blob store and metadata log
pub mod raw_store;
/// Core data types
pub mod types;
/// Version lineage index
pub mod version;

pub use collector::{CollectReport, Collector};
pub use config::{Config, FetchConfig, OversizePolicy, PathsConfig};
pub use error::{Error, Result};
pub use fetcher::{Fetcher, HttpTransport, RawResponse, RetryPolicy, Transport};
pub use hash::compute_hash;
pub use raw_store::RawStore;
pub use types::{
    DedupDecision, DocumentMetadata, DocumentType, FetchResult, VersionDecision, VersionEntry,
    detect_source,
};
pub use version::{VersionTracker, lineage_key};
