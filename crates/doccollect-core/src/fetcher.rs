use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{FetchConfig, OversizePolicy};
use crate::{Error, FetchResult, Result};

/// Upper bound for raw downloads (25 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Attempt count and backoff schedule for one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Backoff step; attempt `n` waits `(n + 1) * base_delay`
    pub base_delay: Duration,
    /// Upper bound on a single backoff sleep
    pub cap_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            cap_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts, `max_retries + 1`.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the failed attempt with 0-based index `attempt`:
    /// `min((attempt + 1) * base_delay, cap_delay)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.saturating_add(1))
            .min(self.cap_delay)
    }
}

/// Status, headers of interest and bounded body of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header value, empty when absent
    pub content_type: String,
    /// Body bytes, at most `limit` of them
    pub body: Vec<u8>,
    /// Set when the body had more than `limit` bytes
    pub truncated: bool,
}

/// Request/response seam used by [`Fetcher`].
///
/// One call is one attempt. Implementations report connection failures as
/// retryable errors ([`Error::Network`] or [`Error::Transport`]) and failures
/// while reading the body as [`Error::BodyRead`]. Status codes are returned,
/// not interpreted.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET for `url`, giving up after `timeout` and keeping at most
    /// `limit` body bytes.
    async fn get(&self, url: &str, timeout: Duration, limit: usize) -> Result<RawResponse>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client that identifies itself with `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration, limit: usize) -> Result<RawResponse> {
        let mut response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string)
            .unwrap_or_default();

        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::BodyRead {
            url: url.to_string(),
            reason: e.to_string(),
        })? {
            let remaining = limit - body.len();
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawResponse {
            status,
            content_type,
            body,
            truncated,
        })
    }
}

/// Downloads documents with retry, backoff and cancellation handling.
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    max_body_bytes: usize,
    oversize: OversizePolicy,
}

impl Fetcher<HttpTransport> {
    /// Creates a fetcher with the default configuration
    pub fn new() -> Result<Self> {
        Self::from_config(&FetchConfig::default())
    }

    /// Creates a fetcher using the HTTP transport and the given settings
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(transport, config))
    }
}

// Note: Default is not implemented as Fetcher::new() can fail.

impl<T: Transport> Fetcher<T> {
    /// Creates a fetcher over an arbitrary transport
    pub fn with_transport(transport: T, config: &FetchConfig) -> Self {
        Self {
            transport,
            policy: config.retry_policy(),
            attempt_timeout: config.attempt_timeout(),
            max_body_bytes: config.max_body_bytes,
            oversize: config.oversize,
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy in effect
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url`, giving up once `deadline` has elapsed.
    ///
    /// A deadline too far out to represent as an instant means no deadline.
    pub async fn fetch(&self, url: &str, deadline: Duration) -> Result<FetchResult> {
        let token = CancellationToken::new();
        self.fetch_with_cancel(url, &token, deadline_after(deadline))
            .await
    }

    /// Fetch `url`, aborting as soon as `cancel` fires or `deadline` passes.
    ///
    /// Cancellation is checked before every attempt and observed during the
    /// request and during backoff sleeps. It surfaces as [`Error::Cancelled`]
    /// or [`Error::DeadlineExceeded`] and is never retried.
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<FetchResult> {
        url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

        let attempts = self.policy.max_attempts();
        let mut last_err: Option<Error> = None;

        for attempt in 0..attempts {
            check_abort(cancel, deadline)?;
            debug!("GET {} (attempt {}/{})", url, attempt + 1, attempts);

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = wait_for_deadline(deadline) => return Err(Error::DeadlineExceeded),
                res = self.transport.get(url, self.attempt_timeout, self.max_body_bytes) => res,
            };

            match self.interpret(url, outcome) {
                Ok(result) => {
                    info!(
                        "Fetched {} bytes from {} (status {})",
                        result.body.len(),
                        url,
                        result.status_code
                    );
                    return Ok(result);
                },
                Err(err) if err.is_retryable() => {
                    warn!("Attempt {} for {} failed: {}", attempt + 1, url, err);
                    last_err = Some(err);
                },
                Err(err) => return Err(err),
            }

            if attempt + 1 < attempts {
                let delay = self.policy.backoff(attempt);
                debug!("Backing off {:?} before retrying {}", delay, url);
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    () = wait_for_deadline(deadline) => return Err(Error::DeadlineExceeded),
                    () = tokio::time::sleep(delay) => {},
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::RetriesExhausted {
            url: url.to_string(),
            attempts,
        }))
    }

    fn interpret(&self, url: &str, outcome: Result<RawResponse>) -> Result<FetchResult> {
        let response = outcome?;

        if response.status >= 400 {
            return Err(Error::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        if response.truncated {
            match self.oversize {
                OversizePolicy::Reject => {
                    return Err(Error::Oversized {
                        url: url.to_string(),
                        limit: self.max_body_bytes,
                    });
                },
                OversizePolicy::Truncate => {
                    warn!(
                        "Body of {} exceeds {} bytes; keeping the first {} bytes",
                        url, self.max_body_bytes, self.max_body_bytes
                    );
                },
            }
        }

        Ok(FetchResult {
            body: response.body,
            content_type: response.content_type,
            status_code: response.status,
            url: url.to_string(),
            truncated: response.truncated,
        })
    }
}

/// `now + timeout`, or `None` when that overflows the clock.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn check_abort(cancel: &CancellationToken, deadline: Option<Instant>) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(Error::DeadlineExceeded);
    }
    Ok(())
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
