//! Retry logic for HTTP requests with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::{ApiError, Error, Result};

/// Default initial backoff duration for retries (1 second).
pub(crate) const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 1;

/// Default maximum backoff duration for retries (60 seconds).
pub(crate) const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;

/// Default maximum number of retry attempts.
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for retry behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial backoff duration for retries.
    pub initial_backoff: Duration,
    /// Maximum backoff duration for retries.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(DEFAULT_INITIAL_BACKOFF_SECS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

impl RetryConfig {
    /// A configuration that retries immediately. Intended for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Calculates the backoff duration for a retry attempt.
    ///
    /// A `Retry-After` value wins when present; otherwise the delay doubles
    /// from `initial_backoff` on each attempt. Both are capped at `max_backoff`.
    pub fn calculate_backoff(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let backoff = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .initial_backoff
                .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX)),
        };
        backoff.min(self.max_backoff)
    }
}

/// Outcome of a single attempt.
enum Attempt {
    Done(reqwest::Response),
    Retry { retry_after: Option<u64> },
}

fn retry_after_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn classify(response: reqwest::Response, attempt: u32, max_retries: u32) -> Attempt {
    let status = response.status();
    let retryable = status.as_u16() == 429 || status.is_server_error();
    if retryable && attempt < max_retries {
        return Attempt::Retry {
            retry_after: retry_after_header(&response),
        };
    }
    Attempt::Done(response)
}

/// Converts a non-success response into an [`Error`].
pub(crate) async fn parse_error_response(response: reqwest::Response, resource: &str) -> Error {
    let status = response.status();
    let status_code = status.as_u16();
    let retry_after = retry_after_header(&response);
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    let api_error = match status_code {
        403 if remaining.as_deref() == Some("0") => ApiError::RateLimit { retry_after },
        401 | 403 => ApiError::Auth { message },
        404 => ApiError::NotFound {
            resource: resource.to_string(),
        },
        429 => ApiError::RateLimit { retry_after },
        400 | 422 => ApiError::Validation { message },
        _ => ApiError::Http {
            status: status_code,
            message,
        },
    };

    Error::Api(api_error)
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": "..."}`.
fn extract_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| Some(body.to_string())),
        Err(_) => Some(body.to_string()),
    }
}

/// Sends a request until it succeeds, fails permanently, or retries run out.
///
/// Returns the successful response; any other outcome becomes an [`Error`].
pub(crate) async fn execute_with_retry<F, Fut>(
    config: &RetryConfig,
    resource: &str,
    mut make_request: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        match classify(response, attempt, config.max_retries) {
            Attempt::Retry { retry_after } => {
                let backoff = config.calculate_backoff(attempt, retry_after);
                tracing::debug!(attempt, ?backoff, resource, "retrying GitHub request");
                sleep(backoff).await;
                attempt += 1;
            }
            Attempt::Done(response) => return Err(parse_error_response(response, resource).await),
        }
    }
}
