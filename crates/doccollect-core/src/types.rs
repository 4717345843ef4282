use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes and response details from one successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Response body, bounded by the configured size limit
    pub body: Vec<u8>,
    /// `Content-Type` header value, empty when absent
    pub content_type: String,
    /// HTTP status code of the final attempt
    pub status_code: u16,
    /// URL that was requested
    pub url: String,
    /// Set when the body was cut off at the size limit
    pub truncated: bool,
}

impl FetchResult {
    /// Guess the document type from the content type, falling back to the
    /// extension of the URL path.
    pub fn suspected_document_type(&self) -> DocumentType {
        let ct = self.content_type.to_ascii_lowercase();
        if ct.contains("pdf") {
            return DocumentType::Pdf;
        }
        if ct.contains("html") || ct.contains("htm") {
            return DocumentType::Html;
        }
        if ct.contains("plain") {
            return DocumentType::Text;
        }

        let Ok(parsed) = url::Url::parse(&self.url) else {
            return DocumentType::Unknown;
        };
        let ext = Path::new(parsed.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => DocumentType::Pdf,
            Some("html" | "htm") => DocumentType::Html,
            Some("txt") => DocumentType::Text,
            _ => DocumentType::Unknown,
        }
    }
}

/// Coarse document classification recorded in metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// PDF document
    Pdf,
    /// HTML page
    Html,
    /// Plain text
    Text,
    /// Anything else
    #[default]
    Unknown,
}

impl DocumentType {
    /// Lowercase tag as written to metadata records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fetched document relates to what was seen before under its lineage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupDecision {
    /// First time this lineage key has been seen
    New,
    /// Content changed since the last recorded version
    NewVersion,
    /// Byte-identical to the latest recorded version
    Duplicate,
}

impl DedupDecision {
    /// Tag as written to metadata records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::NewVersion => "new-version",
            Self::Duplicate => "duplicate",
        }
    }

    /// Whether the content must be written to the blob store.
    pub const fn stores_content(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

impl std::fmt::Display for DedupDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known state for one lineage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Fingerprint of the latest content
    pub latest_hash: String,
    /// Version counter, starting at 1
    pub version: u32,
}

/// Outcome of evaluating a fingerprint against a lineage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecision {
    /// New, new version or duplicate
    pub decision: DedupDecision,
    /// Version number the document is recorded under
    pub version: u32,
    /// Fingerprint of the previous version, empty when there is none
    pub previous_hash: String,
}

/// One metadata record, written once per fetch outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Host the document was retrieved from
    pub source: String,
    /// URL the document was retrieved from
    pub url: String,
    /// Retrieval time
    pub retrieved_at: DateTime<Utc>,
    /// Fingerprint of the content
    #[serde(default)]
    pub content_hash: String,
    /// Inferred document type
    #[serde(default)]
    pub document_type: DocumentType,
    /// Content length in bytes
    #[serde(default)]
    pub content_length: usize,
    /// HTTP status of the fetch
    #[serde(default)]
    pub status_code: u16,
    /// Location of the blob holding the content
    #[serde(default)]
    pub storage_path: PathBuf,
    /// Dedup classification
    pub dedup_decision: DedupDecision,
    /// Version number under the lineage key
    #[serde(default)]
    pub version: u32,
    /// Fingerprint of the previous version, empty when there is none
    #[serde(default)]
    pub previous_hash: String,
    /// Free-form attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl DocumentMetadata {
    /// Start a record for `url`, retrieved now. The source host is derived from the URL.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            source: detect_source(&url),
            url,
            retrieved_at: Utc::now(),
            content_hash: String::new(),
            document_type: DocumentType::Unknown,
            content_length: 0,
            status_code: 0,
            storage_path: PathBuf::new(),
            dedup_decision: DedupDecision::New,
            version: 0,
            previous_hash: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Start a record from a fetch result.
    pub fn from_fetch(result: &FetchResult) -> Self {
        let mut meta = Self::new(result.url.clone());
        meta.document_type = result.suspected_document_type();
        meta.content_length = result.body.len();
        meta.status_code = result.status_code;
        if result.truncated {
            meta.attributes
                .insert("truncated".to_string(), "true".to_string());
        }
        meta
    }

    /// Copy the fingerprint and version decision onto this record.
    pub fn apply_decision(&mut self, content_hash: &str, decision: &VersionDecision) {
        self.content_hash = content_hash.to_string();
        self.dedup_decision = decision.decision;
        self.version = decision.version;
        self.previous_hash.clone_from(&decision.previous_hash);
    }
}

/// Host component of `url`, or `"unknown"` when it has none.
pub fn detect_source(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
