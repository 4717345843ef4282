//! Error types and handling for doccollect-core operations.
//!
//! A single error enum covers every failure in the collection pipeline. Errors
//! are categorized for logging and carry enough information for the fetcher to
//! decide whether another attempt is worthwhile.
//!
//! ## Error Categories
//!
//! - **Fetch errors**: transport failures, body read failures, HTTP statuses
//! - **Cancellation**: external cancellation or an expired deadline
//! - **Precondition errors**: empty payloads, missing fingerprints
//! - **Storage errors**: blob and metadata writes, index persistence
//! - **Configuration errors**: invalid or unreadable config files
//!
//! ## Retry Hints
//!
//! ```rust
//! use doccollect_core::Error;
//!
//! let transient = Error::HttpStatus { status: 503, url: "https://example.com/a.pdf".into() };
//! let permanent = Error::HttpStatus { status: 404, url: "https://example.com/a.pdf".into() };
//!
//! assert!(transient.is_retryable());
//! assert!(!permanent.is_retryable());
//! assert!(!Error::Cancelled.is_retryable());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for doccollect-core operations.
///
/// All public functions in doccollect-core return `Result<T, Error>`.
#[derive(Error, Debug)]
pub enum Error {
    /// Network operation failed inside the reqwest transport.
    ///
    /// ## Recoverability
    ///
    /// Retried by the fetcher. Timeouts and connection resets both land here.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A non-reqwest transport reported a request failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response headers arrived but reading the body failed.
    #[error("Failed to read response body from {url}: {reason}")]
    BodyRead {
        /// URL being fetched.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    ///
    /// ## Recoverability
    ///
    /// `429` and every `5xx` are retried; all other `4xx` fail immediately.
    #[error("HTTP status {status} for {url}")]
    HttpStatus {
        /// Status code returned by the server.
        status: u16,
        /// URL being fetched.
        url: String,
    },

    /// The response body exceeded the configured size bound and the oversize
    /// policy is `reject`.
    #[error("Response from {url} exceeds {limit} bytes")]
    Oversized {
        /// URL being fetched.
        url: String,
        /// Configured body limit in bytes.
        limit: usize,
    },

    /// Every attempt failed without leaving a more specific error behind.
    #[error("Exhausted {attempts} attempts for {url}")]
    RetriesExhausted {
        /// URL being fetched.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the operation completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// URL is malformed or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An input failed validation before any I/O took place.
    ///
    /// ## Common Causes
    ///
    /// - Saving an empty payload
    /// - Recording metadata without a content fingerprint
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A storage write or read failed.
    ///
    /// No partial rollback is attempted; the caller treats the whole save or
    /// record operation for that document as failed.
    #[error("Storage error at {}: {message}", path.display())]
    Storage {
        /// What was being done.
        message: String,
        /// Path involved in the failure.
        path: PathBuf,
    },

    /// The persisted version index could not be parsed.
    ///
    /// Fatal at construction: the tracker refuses to start with unknown state.
    #[error("Version index at {} is corrupt: {reason}", path.display())]
    IndexCorrupt {
        /// Location of the index file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A lineage key has used up its version counter.
    ///
    /// Raised instead of reusing a version number; the index is left unchanged.
    #[error("Version counter exhausted for '{key}'")]
    VersionOverflow {
        /// Lineage key whose counter is at its maximum.
        key: String,
    },

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Build a storage error from an I/O failure at `path`.
    pub fn storage(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        err: &std::io::Error,
    ) -> Self {
        Self::Storage {
            message: format!("{}: {err}", message.into()),
            path: path.into(),
        }
    }

    /// Check whether another fetch attempt might succeed.
    ///
    /// Transport failures, body read failures, `429` and `5xx` are retryable.
    /// Cancellation, deadlines, client errors and local failures are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Transport(_) | Self::BodyRead { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` for [`Error::Cancelled`] and [`Error::DeadlineExceeded`].
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Get the error category as a static string identifier for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Transport(_) | Self::BodyRead { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Oversized { .. } => "oversized",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Cancelled | Self::DeadlineExceeded => "cancelled",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Precondition(_) => "precondition",
            Self::Storage { .. } => "storage",
            Self::IndexCorrupt { .. } => "index_corrupt",
            Self::VersionOverflow { .. } => "version_overflow",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn status(code: u16) -> Error {
        Error::HttpStatus {
            status: code,
            url: "https://example.com/doc".into(),
        }
    }

    #[test]
    fn test_status_retry_classification() {
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());

        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(410).is_retryable());
    }

    #[test]
    fn test_cancellation_never_retryable() {
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::DeadlineExceeded.is_retryable());
        assert!(Error::Cancelled.is_cancellation());
        assert!(Error::DeadlineExceeded.is_cancellation());
        assert!(!status(500).is_cancellation());
    }

    #[test]
    fn test_transport_errors_retryable() {
        assert!(Error::Transport("connection reset".into()).is_retryable());
        assert!(
            Error::BodyRead {
                url: "https://example.com".into(),
                reason: "eof".into(),
            }
            .is_retryable()
        );
        assert!(!Error::Precondition("empty".into()).is_retryable());
        assert!(!Error::InvalidUrl("nope".into()).is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(status(404).category(), "http_status");
        assert_eq!(Error::Cancelled.category(), "cancelled");
        assert_eq!(Error::Precondition(String::new()).category(), "precondition");
        assert_eq!(
            Error::IndexCorrupt {
                path: PathBuf::from("version_index.json"),
                reason: "eof".into(),
            }
            .category(),
            "index_corrupt"
        );
        let overflow = Error::VersionOverflow {
            key: "https://a.test/x".into(),
        };
        assert_eq!(overflow.category(), "version_overflow");
        assert!(!overflow.is_retryable());
    }

    #[test]
    fn test_storage_error_display_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::storage("Failed to write blob", "/data/raw/ab.bin", &io);
        let msg = err.to_string();
        assert!(msg.contains("/data/raw/ab.bin"));
        assert!(msg.contains("Failed to write blob"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let err: Error = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert_eq!(err.category(), "serialization");
    }
}
