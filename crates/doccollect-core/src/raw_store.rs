use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::hash::{compute_hash, is_fingerprint};
use crate::{DocumentMetadata, Error, Result};

/// Upper bound on filename collisions tolerated for one metadata record.
const MAX_NAME_COLLISIONS: u32 = 1024;

/// Content-addressed blob store with an append-only metadata log.
///
/// Layout under the root directory:
///
/// - `raw/<fingerprint>.bin` holds each distinct payload exactly once
/// - `metadata/<fingerprint>-<nanos>.json` holds one record per fetch outcome
#[derive(Debug, Clone)]
pub struct RawStore {
    root: PathBuf,
    raw_dir: PathBuf,
    metadata_dir: PathBuf,
}

impl RawStore {
    /// Open a store rooted at `root`, creating `raw/` and `metadata/` as needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::at(root);

        fs::create_dir_all(&store.raw_dir)
            .map_err(|e| Error::storage("Failed to create raw directory", &store.raw_dir, &e))?;
        fs::create_dir_all(&store.metadata_dir).map_err(|e| {
            Error::storage("Failed to create metadata directory", &store.metadata_dir, &e)
        })?;

        Ok(store)
    }

    /// Handle on a store rooted at `root` without touching the filesystem.
    ///
    /// For read-only use; writes fail if the directories do not exist.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            raw_dir: root.join("raw"),
            metadata_dir: root.join("metadata"),
            root,
        }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding blobs
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Directory holding metadata records
    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Blob path for `fingerprint`. Pure; does not touch the filesystem.
    pub fn raw_path(&self, fingerprint: &str) -> PathBuf {
        self.raw_dir.join(format!("{fingerprint}.bin"))
    }

    /// Store `data` and append a metadata record describing it.
    ///
    /// The blob is written only if no blob exists for its fingerprint yet.
    /// `content_hash`, `content_length` and `storage_path` on the returned
    /// record are filled in from `data`. If the blob write fails no metadata
    /// is written.
    pub fn save(&self, data: &[u8], mut meta: DocumentMetadata) -> Result<DocumentMetadata> {
        if data.is_empty() {
            return Err(Error::Precondition("no data to store".into()));
        }

        meta.content_hash = compute_hash(data);
        meta.content_length = data.len();

        let blob_path = self.raw_path(&meta.content_hash);
        if self.write_blob(&blob_path, data)? {
            debug!("Stored blob {}", blob_path.display());
        } else {
            debug!("Blob {} already present", blob_path.display());
        }
        meta.storage_path = blob_path;

        self.append_metadata(&meta)?;
        Ok(meta)
    }

    /// Append a metadata record for content whose blob is already stored.
    ///
    /// `content_hash` must be set. An empty `storage_path` is derived from the
    /// fingerprint; blob existence is not checked.
    pub fn record_metadata(&self, mut meta: DocumentMetadata) -> Result<DocumentMetadata> {
        if meta.content_hash.is_empty() {
            return Err(Error::Precondition(
                "metadata has no content fingerprint".into(),
            ));
        }
        if !is_fingerprint(&meta.content_hash) {
            return Err(Error::Precondition(format!(
                "malformed content fingerprint '{}'",
                meta.content_hash
            )));
        }
        if meta.storage_path.as_os_str().is_empty() {
            meta.storage_path = self.raw_path(&meta.content_hash);
        }

        self.append_metadata(&meta)?;
        Ok(meta)
    }

    /// Whether a blob exists for `fingerprint`
    pub fn contains(&self, fingerprint: &str) -> bool {
        is_fingerprint(fingerprint) && self.raw_path(fingerprint).is_file()
    }

    /// Read the blob stored under `fingerprint`
    pub fn read_blob(&self, fingerprint: &str) -> Result<Vec<u8>> {
        if !is_fingerprint(fingerprint) {
            return Err(Error::Precondition(format!(
                "malformed content fingerprint '{fingerprint}'"
            )));
        }
        let path = self.raw_path(fingerprint);
        fs::read(&path).map_err(|e| Error::storage("Failed to read blob", &path, &e))
    }

    /// All metadata records written for `fingerprint`, oldest first
    pub fn metadata_records(&self, fingerprint: &str) -> Result<Vec<DocumentMetadata>> {
        let prefix = format!("{fingerprint}-");
        let entries = match fs::read_dir(&self.metadata_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::storage("Failed to list metadata", &self.metadata_dir, &e));
            },
        };

        let mut stamped = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::storage("Failed to list metadata", &self.metadata_dir, &e)
            })?;
            let name = entry.file_name();
            let Some(stamp) = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|ts| ts.parse::<i64>().ok())
            else {
                continue;
            };
            stamped.push((stamp, entry.path()));
        }
        stamped.sort_by_key(|(stamp, _)| *stamp);

        stamped
            .into_iter()
            .map(|(_, path)| -> Result<DocumentMetadata> {
                let json = fs::read_to_string(&path)
                    .map_err(|e| Error::storage("Failed to read metadata", &path, &e))?;
                Ok(serde_json::from_str(&json)?)
            })
            .collect()
    }

    /// Write `data` to `path` unless something is already there.
    ///
    /// The payload goes to a temp file in the blob directory and is linked
    /// into place without clobbering, so a concurrent writer of the same
    /// fingerprint loses cleanly and readers never see a partial blob.
    /// Returns `true` if this call created the blob.
    fn write_blob(&self, path: &Path, data: &[u8]) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        let tmp = temp_file(&self.raw_dir, ".blob-", data)?;
        match tmp.persist_noclobber(path) {
            Ok(_) => Ok(true),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(Error::storage("Failed to commit blob", path, &err.error)),
        }
    }

    /// Write a new metadata record, never replacing an existing one.
    fn append_metadata(&self, meta: &DocumentMetadata) -> Result<PathBuf> {
        let payload = serde_json::to_vec_pretty(meta)?;
        let mut tmp = temp_file(&self.metadata_dir, ".meta-", &payload)?;
        let mut stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        for _ in 0..MAX_NAME_COLLISIONS {
            let path = self
                .metadata_dir
                .join(format!("{}-{stamp}.json", meta.content_hash));
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    debug!("Recorded metadata {}", path.display());
                    return Ok(path);
                },
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                    tmp = err.file;
                    stamp += 1;
                },
                Err(err) => {
                    return Err(Error::storage("Failed to write metadata", &path, &err.error));
                },
            }
        }

        Err(Error::Storage {
            message: format!(
                "no free metadata filename for {} after {MAX_NAME_COLLISIONS} tries",
                meta.content_hash
            ),
            path: self.metadata_dir.clone(),
        })
    }
}

fn temp_file(dir: &Path, prefix: &str, data: &[u8]) -> Result<NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::storage("Failed to create temp file", dir, &e))?;
    if let Err(e) = tmp.write_all(data).and_then(|()| tmp.flush()) {
        return Err(Error::storage("Failed to write temp file", tmp.path(), &e));
    }
    Ok(tmp)
}
