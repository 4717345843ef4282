//! Status command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use doccollect_core::version::INDEX_FILE;
use doccollect_core::{Config, RawStore, VersionTracker, lineage_key};
use serde::Serialize;

use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct LineageStatus {
    key: String,
    version: u32,
    latest_hash: String,
    blob: PathBuf,
    blob_present: bool,
    records: usize,
}

/// Print the lineage entry for `key`. Returns `false` if nothing is recorded.
///
/// Read-only: nothing is created under the storage root.
pub fn execute(config: &Config, key: &str, format: OutputFormat) -> Result<bool> {
    let root = &config.paths.root;
    let entry = if root.join(INDEX_FILE).is_file() {
        VersionTracker::open(root)
            .with_context(|| format!("Failed to load version index under {}", root.display()))?
            .entry(key)?
    } else {
        None
    };

    let Some(entry) = entry else {
        match format {
            OutputFormat::Text => println!("No versions recorded for {key}"),
            OutputFormat::Json => println!("null"),
        }
        return Ok(false);
    };

    let store = RawStore::at(root);
    let records = lineage_records(&store, &entry.latest_hash, key)?;
    let status = LineageStatus {
        key: key.to_string(),
        version: entry.version,
        blob: store.raw_path(&entry.latest_hash),
        blob_present: store.contains(&entry.latest_hash),
        latest_hash: entry.latest_hash,
        records,
    };

    match format {
        OutputFormat::Text => {
            println!("{}", status.key);
            println!("  version:     {}", status.version);
            println!("  latest hash: {}", status.latest_hash);
            println!(
                "  blob:        {}{}",
                status.blob.display(),
                if status.blob_present { "" } else { " (missing)" }
            );
            println!("  records:     {} for the latest content", status.records);
        },
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(true)
}

/// Metadata records for `fingerprint` that belong to the lineage `key`.
fn lineage_records(store: &RawStore, fingerprint: &str, key: &str) -> Result<usize> {
    Ok(store
        .metadata_records(fingerprint)?
        .into_iter()
        .filter(|m| lineage_key(m) == key)
        .count())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use doccollect_core::DocumentMetadata;
    use tempfile::TempDir;

    #[test]
    fn test_host_lineage_excludes_url_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = RawStore::open(temp_dir.path()).unwrap();

        let mut hostless = DocumentMetadata::new("");
        hostless.source = "docs.example.com".to_string();
        let saved = store.save(b"shared body", hostless).unwrap();
        store
            .save(b"shared body", DocumentMetadata::new("https://docs.example.com/a.pdf"))
            .unwrap();

        let fp = &saved.content_hash;
        assert_eq!(lineage_records(&store, fp, "docs.example.com").unwrap(), 1);
        assert_eq!(
            lineage_records(&store, fp, "https://docs.example.com/a.pdf").unwrap(),
            1
        );
    }

    #[test]
    fn test_missing_index_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.root = temp_dir.path().join("data");

        assert!(!execute(&config, "https://never.test/doc.pdf", OutputFormat::Json).unwrap());
        assert!(!config.paths.root.exists());
    }
}
