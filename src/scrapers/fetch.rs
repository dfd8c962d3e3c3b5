//! Article page download.
//!
//! Pages are fetched with a browser-like user agent, retried with
//! exponential backoff on transient statuses, and verified against the
//! bundled root certificates. When verification itself fails the request is
//! repeated once on a client that accepts any certificate: plenty of small
//! blogs run with broken chains and their text is still worth reading.

use crate::error::{FailureKind, FetchError, is_tls_error};
use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Statuses worth another attempt.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Statuses whose `Retry-After` header overrides the computed backoff.
const RETRY_AFTER_STATUSES: [u16; 2] = [429, 503];

/// Tunables for [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Whole-request timeout, per attempt.
    pub timeout: Duration,
    /// Additional attempts after the first one.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Cap on a single backoff delay.
    pub max_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// HTTP client for article pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    verified: reqwest::Client,
    unverified: reqwest::Client,
    settings: FetchSettings,
}

impl PageFetcher {
    /// Build both the verifying and the fallback client.
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let verified = build_client(&settings, false)?;
        let unverified = build_client(&settings, true)?;
        Ok(Self {
            verified,
            unverified,
            settings,
        })
    }

    /// Download `url` and return the decoded body.
    ///
    /// # Errors
    ///
    /// A [`FetchError`] classified as invalid URL, network, timeout, TLS or
    /// HTTP status. Transient statuses are only reported once retries are
    /// exhausted.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed =
            Url::parse(url).map_err(|e| FetchError::new(FailureKind::InvalidUrl, e.to_string()))?;

        match self.get_with_retry(&self.verified, &parsed).await {
            Err(e) if e.kind == FailureKind::Tls => {
                warn!(
                    error = %e,
                    "Certificate verification failed; retrying without verification"
                );
                self.get_with_retry(&self.unverified, &parsed).await
            }
            other => other,
        }
    }

    async fn get_with_retry(
        &self,
        client: &reqwest::Client,
        url: &Url,
    ) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let (err, retry_after) = match client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await.map_err(map_reqwest_error)?;
                    info!(
                        bytes = body.len(),
                        attempts = attempt + 1,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Fetched page"
                    );
                    return Ok(body);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let err = FetchError::new(
                        FailureKind::HttpStatus(status),
                        response.status().to_string(),
                    );
                    if !RETRY_STATUSES.contains(&status) {
                        return Err(err);
                    }
                    let retry_after = RETRY_AFTER_STATUSES
                        .contains(&status)
                        .then(|| parse_retry_after(response.headers()))
                        .flatten();
                    (err, retry_after)
                }
                Err(e) => {
                    let err = map_reqwest_error(e);
                    if err.kind == FailureKind::Tls {
                        return Err(err);
                    }
                    (err, None)
                }
            };

            attempt += 1;
            if attempt > self.settings.max_retries {
                warn!(attempt, error = %err, "Fetch exhausted retries");
                return Err(err);
            }

            let delay = match retry_after {
                Some(hint) => hint.min(self.settings.max_delay),
                None => self.backoff(attempt),
            };
            debug!(
                attempt,
                ?delay,
                ?retry_after,
                error = %err,
                "Fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }

    /// `base * 2^(attempt-1)`, capped, plus up to 100ms of jitter.
    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self
            .settings
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.settings.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=100);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Delay requested by a `Retry-After` header, either delta-seconds or an
/// HTTP date. Dates in the past mean "now".
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

fn build_client(
    settings: &FetchSettings,
    accept_invalid_certs: bool,
) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(settings.timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| FetchError::new(FailureKind::Network, e.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if is_tls_error(&err) {
        return FetchError::new(FailureKind::Tls, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
