use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::schemas::{AttemptOutcome, OutcomeKind};

/// Header carrying the `sha256=<hex>` payload signature
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Header carrying the event tag
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Per-attempt timeout used unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for HTTP client operations
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
}

impl HttpClientError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HttpClientError::Timeout(timeout)
        } else if err.is_builder() {
            HttpClientError::InvalidUrl(err.to_string())
        } else if err.is_connect() {
            HttpClientError::NetworkError(err.to_string())
        } else {
            HttpClientError::RequestFailed(err.to_string())
        }
    }

    fn outcome_kind(&self) -> OutcomeKind {
        match self {
            HttpClientError::Timeout(_) => OutcomeKind::Timeout,
            _ => OutcomeKind::TransportError,
        }
    }
}

/// HTTP client wrapper for webhook delivery.
///
/// Holds no per-request state and is safe to share between concurrent
/// deliveries. Redirects are not followed: a 3xx is a completed, failed attempt.
#[derive(Debug, Clone)]
pub struct WebhookHttpClient {
    client: Client,
    timeout: Duration,
}

impl WebhookHttpClient {
    /// Create a new HTTP client with default timeout (5 seconds)
    pub fn new() -> Result<Self, HttpClientError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .user_agent(format!("webhook-notifier/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Perform exactly one signed POST.
    ///
    /// Never fails: transport problems and timeouts are reported in the
    /// returned outcome, and any HTTP response counts as a completed attempt.
    pub async fn attempt(
        &self,
        url: &str,
        body: &str,
        signature: &str,
        event_type: &str,
    ) -> AttemptOutcome {
        debug!(url = %url, event = %event_type, "Sending webhook");

        let start = Instant::now();

        let result = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, event_type)
            .body(body.to_owned())
            .send()
            .await;

        let elapsed = start.elapsed();

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                debug!(
                    url = %url,
                    status = status_code,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Webhook response received"
                );
                AttemptOutcome::response(status_code, elapsed)
            }
            Err(e) => {
                let err = HttpClientError::from_reqwest(e, self.timeout);
                warn!(url = %url, error = %err, "Webhook request failed");
                AttemptOutcome::failed(err.outcome_kind(), err.to_string(), elapsed)
            }
        }
    }

    /// Get configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
