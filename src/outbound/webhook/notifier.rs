use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::events::WebhookEvent;
use crate::outbound::webhook::dispatcher::WebhookDispatcher;
use crate::outbound::webhook::registry::{NewSubscription, RegistryError, SubscriptionRegistry};
use crate::outbound::webhook::schemas::{DeliveryPayload, DeliveryReport, TestDeliveryResult};
use crate::outbound::webhook::subscription::WebhookSubscription;

/// Entry point for the rest of the application.
///
/// Other subsystems call [`WebhookNotifier::fire`] when a domain event occurs;
/// the management surface uses the registry pass-throughs and
/// [`WebhookNotifier::test`].
#[derive(Clone)]
pub struct WebhookNotifier {
    registry: SubscriptionRegistry,

    dispatcher: Arc<WebhookDispatcher>,
}

/// An in-flight fan-out started by [`WebhookNotifier::fire`].
///
/// Awaiting [`DispatchHandle::wait`] yields one report per matched
/// subscription. Dropping the handle, or calling [`DispatchHandle::detach`],
/// leaves the deliveries running to completion in the background.
#[derive(Debug)]
pub struct DispatchHandle {
    task: Option<JoinHandle<Vec<DeliveryReport>>>,
    matched: usize,
}

impl DispatchHandle {
    fn empty() -> Self {
        Self {
            task: None,
            matched: 0,
        }
    }

    /// Number of subscriptions the payload is being delivered to
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Wait until every retry loop has succeeded or been exhausted
    pub async fn wait(self) -> Vec<DeliveryReport> {
        let Some(task) = self.task else {
            return Vec::new();
        };

        match task.await {
            Ok(reports) => reports,
            Err(e) => {
                error!(error = %e, "Webhook fan-out task failed");
                Vec::new()
            }
        }
    }

    /// Let the deliveries finish unobserved
    pub fn detach(self) {}
}

impl WebhookNotifier {
    pub fn new(registry: SubscriptionRegistry, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub async fn register(
        &self,
        owner_id: &str,
        request: NewSubscription,
    ) -> Result<WebhookSubscription, RegistryError> {
        self.registry.register(owner_id, request).await
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<WebhookSubscription>, RegistryError> {
        self.registry.list(owner_id).await
    }

    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool, RegistryError> {
        self.registry.delete(owner_id, id).await
    }

    /// Notify every active subscription of `owner_id` listening for `event`.
    ///
    /// Never fails: lookup errors and delivery failures are logged, not
    /// returned. The fan-out runs on its own task; see [`DispatchHandle`].
    pub async fn fire(&self, owner_id: &str, event: WebhookEvent, data: Value) -> DispatchHandle {
        let subscriptions = match self.registry.match_event(owner_id, event).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(
                    owner_id = %owner_id,
                    event = %event,
                    error = %e,
                    "Failed to resolve webhook subscriptions – event dropped"
                );
                return DispatchHandle::empty();
            }
        };

        if subscriptions.is_empty() {
            debug!(owner_id = %owner_id, event = %event, "No subscriptions matched");
            return DispatchHandle::empty();
        }

        // Built once, shared read-only by every delivery of this trigger.
        let payload = Arc::new(DeliveryPayload::for_event(event, owner_id, data));
        let matched = subscriptions.len();

        info!(
            owner_id = %owner_id,
            event = %event,
            subscriptions = matched,
            "Dispatching webhook event"
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let task =
            tokio::spawn(async move { dispatcher.deliver_all(subscriptions, payload).await });

        DispatchHandle {
            task: Some(task),
            matched,
        }
    }

    /// Probe one subscription with a single signed `webhook.test` delivery.
    pub async fn test(
        &self,
        owner_id: &str,
        subscription_id: Uuid,
    ) -> Result<TestDeliveryResult, RegistryError> {
        let subscription = self.registry.get(owner_id, subscription_id).await?;
        let payload = DeliveryPayload::test(owner_id);

        let outcome = self
            .dispatcher
            .deliver_one_sync(&subscription, &payload)
            .await;

        if outcome.is_success() {
            info!(
                subscription_id = %subscription_id,
                status_code = outcome.status_code,
                elapsed_ms = outcome.elapsed_ms(),
                "Webhook test succeeded"
            );
        } else {
            warn!(
                subscription_id = %subscription_id,
                status_code = outcome.status_code,
                elapsed_ms = outcome.elapsed_ms(),
                error = outcome.error.as_deref().unwrap_or_default(),
                "Webhook test failed"
            );
        }

        Ok(outcome.into())
    }
}
