//! Configuration management for doccollect.
//!
//! Configuration is stored in TOML and layered in this order:
//!
//! 1. **Defaults**: see [`FetchConfig::default`] and [`PathsConfig::default`]
//! 2. **Config file**: `$DOCCOLLECT_CONFIG`, or `config.toml` in the platform
//!    config directory
//! 3. **Environment**: `DOCCOLLECT_DATA_DIR` overrides the storage root
//! 4. **CLI flags**: applied by the binary on top of the loaded value
//!
//! ## Example Configuration File
//!
//! ```toml
//! [fetch]
//! max_retries = 3
//! base_delay_ms = 2000
//! cap_delay_ms = 15000
//! attempt_timeout_secs = 30
//! deadline_secs = 45
//! max_body_bytes = 26214400
//! oversize = "truncate"
//! concurrency = 4
//!
//! [paths]
//! root = "/var/lib/doccollect"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetcher::{DEFAULT_MAX_BODY_BYTES, RetryPolicy};
use crate::{Error, Result};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DOCCOLLECT_CONFIG";
/// Environment variable overriding the storage root.
pub const DATA_DIR_ENV: &str = "DOCCOLLECT_DATA_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fetch and retry behavior
    pub fetch: FetchConfig,
    /// Storage locations
    pub paths: PathsConfig,
}

/// What to do when a response body is larger than `max_body_bytes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Keep the first `max_body_bytes` bytes and report success.
    ///
    /// The result is flagged as truncated and a warning is logged.
    #[default]
    Truncate,
    /// Fail the fetch with [`Error::Oversized`].
    Reject,
}

/// Fetch and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Backoff step in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff sleep in milliseconds
    pub cap_delay_ms: u64,
    /// Timeout for a single attempt in seconds
    pub attempt_timeout_secs: u64,
    /// Deadline for a whole fetch call, retries included, in seconds
    pub deadline_secs: u64,
    /// Largest response body kept, in bytes
    pub max_body_bytes: usize,
    /// Handling of bodies over `max_body_bytes`
    pub oversize: OversizePolicy,
    /// Number of URLs fetched at once in a batch
    pub concurrency: usize,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            cap_delay_ms: 15_000,
            attempt_timeout_secs: 30,
            deadline_secs: 45,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            oversize: OversizePolicy::Truncate,
            concurrency: 1,
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Retry policy described by this configuration.
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            cap_delay: Duration::from_millis(self.cap_delay_ms),
        }
    }

    /// Per-attempt timeout.
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Deadline for one fetch call.
    pub const fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(Error::Config("fetch.max_body_bytes must be positive".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("fetch.concurrency must be at least 1".into()));
        }
        if self.cap_delay_ms < self.base_delay_ms {
            return Err(Error::Config(
                "fetch.cap_delay_ms must not be smaller than fetch.base_delay_ms".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("fetch.user_agent cannot be empty".into()));
        }
        Ok(())
    }
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory holding `raw/`, `metadata/` and `version_index.json`
    pub root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let root = directories::ProjectDirs::from("dev", "outfitter", "doccollect")
            .map_or_else(
                || PathBuf::from("doccollect-data"),
                |dirs| dirs.data_dir().to_path_buf(),
            );
        Self { root }
    }
}

impl Config {
    /// Load configuration from `$DOCCOLLECT_CONFIG` or the platform config
    /// directory, then apply environment overrides.
    ///
    /// A missing file yields defaults; an unreadable or malformed file is an error.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`Config::load`], but an `explicit` path takes precedence over
    /// discovery and must exist.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        config.fetch.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?;
        config.fetch.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env_overrides(&mut self, data_dir: Option<PathBuf>) {
        if let Some(dir) = data_dir.filter(|d| !d.as_os_str().is_empty()) {
            tracing::debug!("Using data dir from {}: {}", DATA_DIR_ENV, dir.display());
            self.paths.root = dir;
        }
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        directories::ProjectDirs::from("dev", "outfitter", "doccollect")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// `doccollect/<version>`
pub fn default_user_agent() -> String {
    concat!("doccollect/", env!("CARGO_PKG_VERSION")).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_collector_policy() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.max_retries, 3);
        assert_eq!(fetch.max_body_bytes, 25 * 1024 * 1024);
        assert_eq!(fetch.oversize, OversizePolicy::Truncate);

        let policy = fetch.retry_policy();
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.cap_delay, Duration::from_secs(15));
        assert_eq!(fetch.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(fetch.deadline(), Duration::from_secs(45));
        assert!(fetch.user_agent.starts_with("doccollect/"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[fetch]\nmax_retries = 5\noversize = \"reject\"\n\n[paths]\nroot = \"/tmp/dc\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.oversize, OversizePolicy::Reject);
        assert_eq!(config.fetch.base_delay_ms, 2_000);
        assert_eq!(config.paths.root, PathBuf::from("/tmp/dc"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[fetch\nmax_retries = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[fetch]\nconcurrency = 0\n").unwrap();
        assert!(Config::from_file(&path).is_err());

        fs::write(&path, "[fetch]\nbase_delay_ms = 5000\ncap_delay_ms = 100\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = Config::default();
        config.apply_env_overrides(Some(PathBuf::from("/srv/collector")));
        assert_eq!(config.paths.root, PathBuf::from("/srv/collector"));

        let before = config.paths.root.clone();
        config.apply_env_overrides(Some(PathBuf::new()));
        assert_eq!(config.paths.root, before);
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
