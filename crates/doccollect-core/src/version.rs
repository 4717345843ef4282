//! Version lineage tracking.
//!
//! [`VersionTracker`] owns the mapping from lineage key to the latest known
//! fingerprint and version counter. The map lives behind a single mutex and
//! is mirrored to `version_index.json` after every change, so each
//! [`VersionTracker::evaluate`] call is atomic with respect to every other one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::{DedupDecision, DocumentMetadata, Error, Result, VersionDecision, VersionEntry};

/// File name of the persisted index under the store root.
pub const INDEX_FILE: &str = "version_index.json";

type Entries = BTreeMap<String, VersionEntry>;

/// Persisted lineage key → [`VersionEntry`] map.
#[derive(Debug)]
pub struct VersionTracker {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl VersionTracker {
    /// Load the index from `root/version_index.json`.
    ///
    /// A missing file means no keys are known yet. A file that does not parse,
    /// or holds an entry with version 0 or an empty hash, fails with
    /// [`Error::IndexCorrupt`].
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .map_err(|e| Error::storage("Failed to create index directory", root, &e))?;
        let path = root.join(INDEX_FILE);

        let entries: Entries = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| Error::IndexCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(Error::storage("Failed to read version index", &path, &e)),
        };

        if let Some((key, _)) = entries
            .iter()
            .find(|(_, entry)| entry.version == 0 || entry.latest_hash.is_empty())
        {
            return Err(Error::IndexCorrupt {
                path,
                reason: format!("invalid entry for '{key}'"),
            });
        }

        debug!("Loaded {} lineage keys from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Classify `fingerprint` against the history of `key` and record the result.
    ///
    /// - unknown key: [`DedupDecision::New`] at version 1
    /// - same fingerprint as the latest: [`DedupDecision::Duplicate`], nothing changes
    /// - different fingerprint: [`DedupDecision::NewVersion`] at the next version
    ///
    /// New and new-version outcomes are persisted before the call returns. If
    /// persisting fails the in-memory change is undone and the error returned.
    pub fn evaluate(&self, key: &str, fingerprint: &str) -> Result<VersionDecision> {
        if key.is_empty() {
            return Err(Error::Precondition("lineage key is empty".into()));
        }
        if fingerprint.is_empty() {
            return Err(Error::Precondition("content fingerprint is empty".into()));
        }

        let mut entries = self.lock()?;
        let previous = entries.get(key).cloned();

        let decision = match &previous {
            None => VersionDecision {
                decision: DedupDecision::New,
                version: 1,
                previous_hash: String::new(),
            },
            Some(entry) if entry.latest_hash == fingerprint => {
                return Ok(VersionDecision {
                    decision: DedupDecision::Duplicate,
                    version: entry.version,
                    previous_hash: entry.latest_hash.clone(),
                });
            },
            Some(entry) => VersionDecision {
                decision: DedupDecision::NewVersion,
                version: entry.version.checked_add(1).ok_or_else(|| {
                    Error::VersionOverflow {
                        key: key.to_string(),
                    }
                })?,
                previous_hash: entry.latest_hash.clone(),
            },
        };

        entries.insert(
            key.to_string(),
            VersionEntry {
                latest_hash: fingerprint.to_string(),
                version: decision.version,
            },
        );

        if let Err(err) = self.persist(&entries) {
            match previous {
                Some(entry) => entries.insert(key.to_string(), entry),
                None => entries.remove(key),
            };
            return Err(err);
        }

        debug!("{} -> {} v{}", key, decision.decision, decision.version);
        Ok(decision)
    }

    /// [`evaluate`](Self::evaluate) under the lineage key of `meta`.
    pub fn evaluate_document(
        &self,
        meta: &DocumentMetadata,
        fingerprint: &str,
    ) -> Result<VersionDecision> {
        self.evaluate(&lineage_key(meta), fingerprint)
    }

    /// Current entry for `key`, read under the same lock as `evaluate`.
    pub fn entry(&self, key: &str) -> Result<Option<VersionEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries.lock().map_err(|_| Error::Storage {
            message: "version index lock poisoned".into(),
            path: self.path.clone(),
        })
    }

    /// Hold the index lock for `held`, signalling `locked` once it is taken.
    #[cfg(test)]
    pub(crate) fn hold_lock(
        &self,
        held: std::time::Duration,
        locked: &std::sync::mpsc::Sender<()>,
    ) {
        let _guard = self.entries.lock();
        let _ = locked.send(());
        std::thread::sleep(held);
    }

    /// Replace the index file with a snapshot of `entries` via temp file + rename.
    fn persist(&self, entries: &Entries) -> Result<()> {
        let payload = serde_json::to_vec_pretty(entries)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".version_index-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::storage("Failed to create temp index", dir, &e))?;
        if let Err(e) = tmp.write_all(&payload).and_then(|()| tmp.as_file().sync_all()) {
            return Err(Error::storage("Failed to write temp index", tmp.path(), &e));
        }
        tmp.persist(&self.path)
            .map_err(|e| Error::storage("Failed to commit version index", &self.path, &e.error))?;
        Ok(())
    }
}

/// Key under which version history for `meta` is tracked: its URL, or its
/// source host when the URL is empty.
pub fn lineage_key(meta: &DocumentMetadata) -> String {
    if meta.url.is_empty() {
        meta.source.clone()
    } else {
        meta.url.clone()
    }
}
