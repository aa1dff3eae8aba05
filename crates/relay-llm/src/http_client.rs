//! Shared HTTP client infrastructure for HTTP-based providers
//!
//! One `reqwest::Client` is configured per process and reused by every backend.
//! Each attempt is a single request: retry policy belongs to the orchestrator.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_utils::error::LlmError;

/// Upper bound on any single request, whatever the provider timeout says
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client for providers
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Execute one request and decode its JSON body.
    ///
    /// The effective timeout is `min(timeout, max_timeout)` and covers the whole
    /// exchange including the body. The request races `cancel`; if the token fires
    /// first the in-flight request is dropped and `LlmError::Cancelled` returned.
    ///
    /// # Errors
    ///
    /// - `LlmError::Unauthorized` for 401/403
    /// - `LlmError::RateLimited` for 429
    /// - `LlmError::ModelNotFound` for 404
    /// - `LlmError::Internal` for 5xx, other 4xx and network failures
    /// - `LlmError::Timeout` when the timeout elapses
    /// - `LlmError::MalformedResponse` when the body is not JSON
    /// - `LlmError::Cancelled` when `cancel` fires
    pub async fn execute_json(
        &self,
        request_builder: reqwest::RequestBuilder,
        timeout: Duration,
        provider: &str,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, LlmError> {
        let effective_timeout = timeout.min(self.max_timeout);

        let request = request_builder
            .timeout(effective_timeout)
            .build()
            .map_err(|e| {
                LlmError::Internal(format!(
                    "{provider}: failed to build request: {}",
                    redact_error_message(&e.to_string())
                ))
            })?;

        debug!(
            provider = provider,
            timeout_ms = effective_timeout.as_millis() as u64,
            "Executing HTTP request"
        );

        let exchange = async {
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| map_transport_error(&e, effective_timeout, provider))?;

            let status = response.status();
            if !status.is_success() {
                return Err(map_status_error(status, provider));
            }

            response.json::<serde_json::Value>().await.map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        duration: effective_timeout,
                    }
                } else {
                    LlmError::MalformedResponse(format!(
                        "{provider} returned a non-JSON body: {}",
                        redact_error_message(&e.to_string())
                    ))
                }
            })
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(provider = provider, "HTTP request cancelled");
                Err(LlmError::Cancelled)
            }
            result = exchange => result,
        }
    }
}

fn map_transport_error(e: &reqwest::Error, timeout: Duration, provider: &str) -> LlmError {
    if e.is_timeout() {
        return LlmError::Timeout { duration: timeout };
    }
    LlmError::Internal(format!(
        "{provider} request failed: {}",
        redact_error_message(&e.to_string())
    ))
}

/// Map non-success HTTP status codes to `LlmError` variants
fn map_status_error(status: StatusCode, provider: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::Unauthorized(format!("{provider} authentication failed: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::RateLimited(format!("{provider} rate limit exceeded: {status}"))
        }
        StatusCode::NOT_FOUND => {
            LlmError::ModelNotFound(format!("{provider} does not serve the model: {status}"))
        }
        s if s.is_server_error() => {
            LlmError::Internal(format!("{provider} returned server error: {status}"))
        }
        _ => LlmError::Internal(format!("{provider} returned client error: {status}")),
    }
}

/// URLs with embedded credentials
static URL_WITH_CREDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^:@\s]+:[^@\s]+@").expect("valid regex"));

/// Long alphanumeric runs that may be API keys
static POTENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_-])[A-Za-z0-9_-]{32,}(?:[^A-Za-z0-9_-]|$)")
        .expect("valid regex")
});

/// Bearer tokens in echoed headers
static BEARER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(bearer\s+)[^\s,;]+").expect("valid regex"));

/// Strip credentials from an error message before it is logged or surfaced.
pub(crate) fn redact_error_message(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    let redacted = BEARER.replace_all(&redacted, "$1[REDACTED]");
    let redacted = POTENTIAL_KEY.replace_all(&redacted, "[REDACTED_KEY]");
    redacted.to_string()
}
