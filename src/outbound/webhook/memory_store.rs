use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::subscription::WebhookSubscription;
use crate::domain::events::WebhookEvent;
use crate::domain::ports::{StoreError, SubscriptionStore};

/// In-memory subscription store.
///
/// Backs the standalone server and the test suite. Records live for the
/// lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    records: Arc<RwLock<HashMap<Uuid, WebhookSubscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all owners
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(
        &self,
        subscription: WebhookSubscription,
    ) -> Result<WebhookSubscription, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&subscription.id) {
            return Err(StoreError::Conflict(subscription.id));
        }

        debug!(
            subscription_id = %subscription.id,
            owner_id = %subscription.owner_id,
            "Storing subscription"
        );
        records.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<WebhookSubscription>, StoreError> {
        let records = self.records.read().await;
        let mut owned: Vec<_> = records
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|s| s.created_at);
        Ok(owned)
    }

    async fn get(
        &self,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<WebhookSubscription>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).filter(|s| s.owner_id == owner_id).cloned())
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let owned = records.get(&id).is_some_and(|s| s.owner_id == owner_id);
        if owned {
            records.remove(&id);
        }
        Ok(owned)
    }

    async fn find_active_for_event(
        &self,
        owner_id: &str,
        event: WebhookEvent,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|s| s.owner_id == owner_id && s.matches_event(event))
            .cloned()
            .collect())
    }
}
