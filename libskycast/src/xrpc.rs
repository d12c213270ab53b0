//! Resilient XRPC request execution
//!
//! Every network call in Skycast goes through [`XrpcClient::execute`], which
//! retries transient failures (timeouts, connection errors, HTTP 429 and
//! 5xx) with exponential backoff and reports each retry on stderr. Anything
//! else is returned to the caller on the first occurrence.

use std::thread;
use std::time::Duration;

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::warn;

use crate::error::{ApiError, Result};

/// Retry budget for one logical call.
///
/// `max_attempts` counts every attempt, the first try included, so the
/// default of 3 allows the initial request plus two retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed attempt (1-based): base, 2x, 4x, ...
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2_u32.pow(attempt - 1)
    }
}

/// Blocking HTTP client bound to a single XRPC host.
///
/// The host is explicit so self-hosted PDS instances and test servers work
/// without touching global state.
#[derive(Debug, Clone)]
pub struct XrpcClient {
    host: String,
    http: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl XrpcClient {
    /// Create a client for one host, e.g. `https://bsky.social`.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let host = host.into().trim_end_matches('/').to_string();
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            host,
            http,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy. Tests use millisecond delays here.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Start a GET request for an XRPC method.
    pub fn get(&self, nsid: &str) -> RequestBuilder {
        self.http.get(self.endpoint(nsid))
    }

    /// Start a POST request for an XRPC method.
    pub fn post(&self, nsid: &str) -> RequestBuilder {
        self.http.post(self.endpoint(nsid))
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.host, nsid)
    }

    /// Send a request, retrying transient failures with exponential backoff.
    ///
    /// Retryable outcomes are request timeouts, connection failures, HTTP
    /// 429 and HTTP 5xx. A `Retry-After` header (integer seconds) takes
    /// precedence over the exponential delay on 429 responses. Responses
    /// with any other status are returned as-is; status checking is the
    /// caller's job (see [`require_success`]).
    ///
    /// `what` names the operation in logs and errors, e.g. `"uploadBlob"`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RetriesExhausted`] once `max_attempts` transient
    /// failures have occurred, or [`ApiError::Network`] for failures that
    /// cannot be retried.
    pub fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts {
            let prepared = request
                .try_clone()
                .ok_or_else(|| ApiError::Network(format!("{} request cannot be retried", what)))?;

            match prepared.send() {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) {
                        return Ok(response);
                    }

                    let reason = format!("HTTP {}", status.as_u16());
                    if attempt == max_attempts {
                        warn!("{} failed after {} attempts: {}", what, max_attempts, reason);
                        return Err(ApiError::RetriesExhausted {
                            what: what.to_string(),
                            attempts: max_attempts,
                            reason,
                        }
                        .into());
                    }

                    let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                        retry_after(&response)
                            .unwrap_or_else(|| self.retry.backoff_delay(attempt))
                    } else {
                        self.retry.backoff_delay(attempt)
                    };
                    warn!(
                        "{} returned {} (attempt {}/{}). Retrying in {}s...",
                        what,
                        reason,
                        attempt,
                        max_attempts,
                        delay.as_secs()
                    );
                    thread::sleep(delay);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt == max_attempts {
                        warn!("{} failed after {} attempts: {}", what, max_attempts, e);
                        return Err(ApiError::RetriesExhausted {
                            what: what.to_string(),
                            attempts: max_attempts,
                            reason: e.to_string(),
                        }
                        .into());
                    }

                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        "Transient error during {} (attempt {}/{}): {}. Retrying in {}s...",
                        what,
                        attempt,
                        max_attempts,
                        e,
                        delay.as_secs()
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    return Err(ApiError::Network(format!("{}: {}", what, e)).into());
                }
            }
        }

        // Every path above returns on the final attempt, but just in case
        Err(ApiError::RetriesExhausted {
            what: what.to_string(),
            attempts: max_attempts,
            reason: "retry budget spent".to_string(),
        }
        .into())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Integer-seconds `Retry-After` value, if the server sent a usable one.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Turn a non-2xx response into a typed error.
///
/// 401 maps to [`ApiError::Authentication`]; everything else becomes
/// [`ApiError::Status`] carrying the response body as detail.
pub fn require_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Authentication(format!(
            "{} was rejected: check your handle and app password",
            what
        ))
        .into());
    }

    let detail = match response.text() {
        Ok(body) if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    Err(ApiError::Status {
        what: what.to_string(),
        status: status.as_u16(),
        detail,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_delay_scales_with_base() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(250));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));

        assert!(!is_retryable_status(StatusCode::OK));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_endpoint_formatting() {
        let client = XrpcClient::new("https://bsky.social").unwrap();
        assert_eq!(
            client.endpoint("com.atproto.server.createSession"),
            "https://bsky.social/xrpc/com.atproto.server.createSession"
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = XrpcClient::new("https://bsky.social/").unwrap();
        assert_eq!(client.host(), "https://bsky.social");
        assert_eq!(
            client.endpoint("com.atproto.identity.resolveHandle"),
            "https://bsky.social/xrpc/com.atproto.identity.resolveHandle"
        );
    }
}
