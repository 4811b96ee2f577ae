/*
   This module specifies the API by which the webhook engine reaches the subscription store.
*/

use crate::domain::events::WebhookEvent;
use crate::outbound::webhook::subscription::WebhookSubscription;
use async_trait::async_trait;
use uuid::Uuid;

/// Error type for subscription store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Subscription store unavailable: {0}")]
    Unavailable(String),

    #[error("Subscription {0} already exists")]
    Conflict(Uuid),
}

/// Persistent home of subscription records.
///
/// Every lookup and mutation is scoped by owner; an implementation must never
/// return or remove a record belonging to a different owner.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(
        &self,
        subscription: WebhookSubscription,
    ) -> Result<WebhookSubscription, StoreError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<WebhookSubscription>, StoreError>;

    async fn get(
        &self,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<WebhookSubscription>, StoreError>;

    /// Returns `true` when a record was removed
    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool, StoreError>;

    /// Active subscriptions of `owner_id` whose event set contains `event`
    async fn find_active_for_event(
        &self,
        owner_id: &str,
        event: WebhookEvent,
    ) -> Result<Vec<WebhookSubscription>, StoreError>;
}
