use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::WebhookConfig;
use crate::outbound::webhook::hmac_signer::HmacSigner;
use crate::outbound::webhook::http_client::{HttpClientError, WebhookHttpClient};
use crate::outbound::webhook::retry_strategy::RetryStrategy;
use crate::outbound::webhook::schemas::{
    AttemptOutcome, DeliveryAttempt, DeliveryPayload, DeliveryReport, DeliveryState, OutcomeKind,
};
use crate::outbound::webhook::subscription::WebhookSubscription;

/// Fan-out limit used unless configured otherwise
pub const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 64;

/// Signs payloads and drives the per-subscription retry loop.
///
/// One retry loop runs per subscription. Loops never share mutable state, so
/// a slow or failing endpoint cannot hold up delivery to any other one. The
/// only shared resource is a semaphore bounding how many requests are in
/// flight across all fan-outs of this dispatcher; backoff sleeps hold no permit.
pub struct WebhookDispatcher {
    /// HTTP client reused across all requests.
    http_client: WebhookHttpClient,

    /// Retry configuration applied to every fire-path delivery.
    retry_strategy: RetryStrategy,

    /// Secret for subscriptions that did not register their own.
    default_secret: String,

    permits: Arc<Semaphore>,
}

impl WebhookDispatcher {
    /// Create a dispatcher with the default retry strategy.
    pub fn new(http_client: WebhookHttpClient, default_secret: impl Into<String>) -> Self {
        Self {
            http_client,
            retry_strategy: RetryStrategy::default_strategy(),
            default_secret: default_secret.into(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_DELIVERIES)),
        }
    }

    /// Build a dispatcher from the `webhook` configuration section.
    pub fn from_config(config: &WebhookConfig) -> Result<Self, HttpClientError> {
        let http_client =
            WebhookHttpClient::with_timeout(Duration::from_millis(config.request_timeout_ms))?;

        Ok(Self::new(http_client, config.default_secret.clone())
            .with_retry_strategy(RetryStrategy::from_millis(
                config.max_attempts,
                &config.retry_delays_ms,
            ))
            .with_max_concurrency(config.max_concurrent_deliveries))
    }

    /// Override the retry strategy.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Override how many requests may be in flight at once.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }

    /// Canonical body and signature token for one subscription.
    fn prepare(
        &self,
        subscription: &WebhookSubscription,
        payload: &DeliveryPayload,
    ) -> Result<(String, String), serde_json::Error> {
        let body = payload.to_canonical_json()?;
        let signer = HmacSigner::new(subscription.effective_secret(&self.default_secret));
        let signature = signer.sign_bytes(body.as_bytes());
        Ok((body, signature))
    }

    /// Deliver one payload to one subscription, retrying until success or exhaustion.
    ///
    /// The body and signature are computed once and reused across attempts.
    /// Exhaustion is only logged.
    pub async fn deliver_one(
        &self,
        subscription: &WebhookSubscription,
        payload: &DeliveryPayload,
    ) -> DeliveryReport {
        let sub_id = subscription.id;
        let event = payload.event_type();
        let mut attempts = Vec::new();

        let (body, signature) = match self.prepare(subscription, payload) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(
                    subscription_id = %sub_id,
                    event = %event,
                    error = %e,
                    "Failed to encode webhook payload – dropping delivery"
                );
                return DeliveryReport {
                    subscription_id: sub_id,
                    state: DeliveryState::Exhausted,
                    attempts,
                };
            }
        };

        let max_attempts = self.retry_strategy.max_attempts();
        let mut completed = 0u32;

        while let Some(delay) = self.retry_strategy.next_delay(completed) {
            if !delay.is_zero() {
                debug!(
                    subscription_id = %sub_id,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before next attempt"
                );
                tokio::time::sleep(delay).await;
            }

            completed += 1;
            let outcome = {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = self.permits.acquire().await.ok();
                self.http_client
                    .attempt(&subscription.url, &body, &signature, event)
                    .await
            };

            if outcome.is_success() {
                info!(
                    subscription_id = %sub_id,
                    event = %event,
                    attempt = completed,
                    status_code = outcome.status_code,
                    elapsed_ms = outcome.elapsed_ms(),
                    "Webhook delivered"
                );
            } else {
                warn!(
                    subscription_id = %sub_id,
                    event = %event,
                    attempt = completed,
                    max_attempts = max_attempts,
                    status_code = outcome.status_code,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "Webhook delivery attempt failed"
                );
            }

            let success = outcome.is_success();
            attempts.push(DeliveryAttempt {
                subscription_id: sub_id,
                attempt: completed,
                outcome,
            });

            if success {
                return DeliveryReport {
                    subscription_id: sub_id,
                    state: DeliveryState::Succeeded,
                    attempts,
                };
            }
        }

        error!(
            subscription_id = %sub_id,
            event = %event,
            attempts = completed,
            "Webhook delivery exhausted"
        );

        DeliveryReport {
            subscription_id: sub_id,
            state: DeliveryState::Exhausted,
            attempts,
        }
    }

    /// Perform exactly one signed attempt and hand back its outcome.
    pub async fn deliver_one_sync(
        &self,
        subscription: &WebhookSubscription,
        payload: &DeliveryPayload,
    ) -> AttemptOutcome {
        match self.prepare(subscription, payload) {
            Ok((body, signature)) => {
                self.http_client
                    .attempt(&subscription.url, &body, &signature, payload.event_type())
                    .await
            }
            Err(e) => AttemptOutcome::failed(
                OutcomeKind::TransportError,
                format!("Failed to encode payload: {e}"),
                Duration::ZERO,
            ),
        }
    }

    /// Deliver one payload to every subscription concurrently.
    ///
    /// Each subscription gets its own task and retry loop. Resolves once every
    /// loop has reached a terminal state; reports arrive in completion order.
    pub async fn deliver_all(
        self: &Arc<Self>,
        subscriptions: Vec<WebhookSubscription>,
        payload: Arc<DeliveryPayload>,
    ) -> Vec<DeliveryReport> {
        let mut tasks = JoinSet::new();

        for subscription in subscriptions {
            let dispatcher = Arc::clone(self);
            let payload = Arc::clone(&payload);

            tasks.spawn(async move { dispatcher.deliver_one(&subscription, &payload).await });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Webhook delivery task aborted"),
            }
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::WebhookEvent;
    use serde_json::json;

    fn make_sub(url: &str) -> WebhookSubscription {
        WebhookSubscription::new("owner-1", url, [WebhookEvent::ResourceCreated])
    }

    fn make_payload() -> DeliveryPayload {
        DeliveryPayload::for_event(WebhookEvent::ResourceCreated, "owner-1", json!({"id": 1}))
    }

    fn make_dispatcher(strategy: RetryStrategy) -> WebhookDispatcher {
        let client = WebhookHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        WebhookDispatcher::new(client, "default-secret-for-tests").with_retry_strategy(strategy)
    }

    #[test]
    fn test_prepare_uses_subscription_secret() {
        let dispatcher = make_dispatcher(RetryStrategy::single_attempt());
        let payload = make_payload();
        let sub = make_sub("http://127.0.0.1:19999").with_secret("subscription-secret-1234");

        let (body, signature) = dispatcher.prepare(&sub, &payload).unwrap();

        assert!(HmacSigner::new("subscription-secret-1234").verify_bytes(body.as_bytes(), &signature));
        assert!(!HmacSigner::new("default-secret-for-tests").verify_bytes(body.as_bytes(), &signature));
        assert!(HmacSigner::new("subscription-secret-1234").verify(&payload, &signature));
    }

    #[test]
    fn test_prepare_falls_back_to_default_secret() {
        let dispatcher = make_dispatcher(RetryStrategy::single_attempt());
        let payload = make_payload();
        let sub = make_sub("http://127.0.0.1:19999");

        let (_, signature) = dispatcher.prepare(&sub, &payload).unwrap();

        assert!(HmacSigner::new("default-secret-for-tests").verify(&payload, &signature));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_exhausts_attempts() {
        let dispatcher = make_dispatcher(RetryStrategy::from_millis(3, &[1, 1]));
        let sub = make_sub("http://127.0.0.1:19998"); // Nothing listening here

        let report = dispatcher.deliver_one(&sub, &make_payload()).await;

        assert_eq!(report.state, DeliveryState::Exhausted);
        assert_eq!(report.attempt_count(), 3);
        assert!(
            report
                .attempts
                .iter()
                .all(|a| a.outcome.kind == OutcomeKind::TransportError)
        );
    }

    #[tokio::test]
    async fn test_single_attempt_strategy_does_not_retry() {
        let dispatcher = make_dispatcher(RetryStrategy::single_attempt());
        let sub = make_sub("http://127.0.0.1:19997");

        let report = dispatcher.deliver_one(&sub, &make_payload()).await;

        assert_eq!(report.attempt_count(), 1);
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn test_deliver_one_sync_reports_failure() {
        let dispatcher = make_dispatcher(RetryStrategy::default_strategy());
        let sub = make_sub("http://127.0.0.1:19996");

        let outcome = dispatcher.deliver_one_sync(&sub, &make_payload()).await;

        assert!(!outcome.is_success());
        assert!(outcome.status_code.is_none());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_deliver_all_with_no_subscriptions() {
        let dispatcher = Arc::new(make_dispatcher(RetryStrategy::single_attempt()));

        let reports = dispatcher
            .deliver_all(Vec::new(), Arc::new(make_payload()))
            .await;

        assert!(reports.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = WebhookConfig {
            default_secret: "configured-default-secret".to_string(),
            request_timeout_ms: 750,
            max_attempts: 4,
            retry_delays_ms: vec![10, 20],
            max_concurrent_deliveries: 8,
        };

        let dispatcher = WebhookDispatcher::from_config(&config).unwrap();

        assert_eq!(dispatcher.retry_strategy().max_attempts(), 4);
        assert_eq!(
            dispatcher.retry_strategy().next_delay(3),
            Some(Duration::from_millis(20))
        );
        assert_eq!(dispatcher.http_client.timeout(), Duration::from_millis(750));
        assert_eq!(dispatcher.permits.available_permits(), 8);
    }
}
