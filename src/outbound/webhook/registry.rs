use std::collections::BTreeSet;
use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::events::WebhookEvent;
use crate::domain::ports::{StoreError, SubscriptionStore};
use crate::outbound::webhook::subscription::WebhookSubscription;

pub const MIN_SECRET_LEN: usize = 16;
pub const MAX_SECRET_LEN: usize = 128;

/// Errors surfaced by subscription management
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),

    #[error("Webhook not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registration input, as received from the management surface
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubscription {
    pub url: String,

    pub events: Vec<String>,

    #[serde(default)]
    pub secret: Option<String>,
}

/// Validated registration input
#[derive(Debug)]
struct ValidSubscription {
    url: String,
    events: BTreeSet<WebhookEvent>,
    secret: Option<String>,
}

impl NewSubscription {
    fn validate(self) -> Result<ValidSubscription, RegistryError> {
        validate_url(&self.url)?;
        let events = validate_events(&self.events)?;
        if let Some(secret) = &self.secret {
            validate_secret(secret)?;
        }

        Ok(ValidSubscription {
            url: self.url,
            events,
            secret: self.secret,
        })
    }
}

fn validate_url(url: &str) -> Result<(), RegistryError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(RegistryError::Validation(
            "Webhook URL must start with http:// or https://".to_string(),
        ));
    }

    match Url::parse(url) {
        Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(()),
        _ => Err(RegistryError::Validation(format!("Invalid webhook URL: {url}"))),
    }
}

fn validate_events(events: &[String]) -> Result<BTreeSet<WebhookEvent>, RegistryError> {
    if events.is_empty() {
        return Err(RegistryError::Validation(
            "At least one event must be subscribed to".to_string(),
        ));
    }

    events
        .iter()
        .map(|e| {
            e.parse::<WebhookEvent>()
                .map_err(|err| RegistryError::Validation(err.to_string()))
        })
        .collect()
}

fn validate_secret(secret: &str) -> Result<(), RegistryError> {
    let len = secret.chars().count();
    if !(MIN_SECRET_LEN..=MAX_SECRET_LEN).contains(&len) {
        return Err(RegistryError::Validation(format!(
            "Secret must be between {MIN_SECRET_LEN} and {MAX_SECRET_LEN} characters"
        )));
    }
    Ok(())
}

/// Owns the subscription lifecycle on top of a [`SubscriptionStore`].
///
/// Every operation is a single store round-trip scoped by owner.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new subscription
    pub async fn register(
        &self,
        owner_id: &str,
        request: NewSubscription,
    ) -> Result<WebhookSubscription, RegistryError> {
        let valid = request.validate()?;

        let mut subscription = WebhookSubscription::new(owner_id, valid.url, valid.events);
        subscription.signing_secret = valid.secret;

        let stored = self.store.insert(subscription).await?;

        info!(
            owner_id = %owner_id,
            subscription_id = %stored.id,
            events = ?stored.events,
            "Webhook registered"
        );

        Ok(stored)
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<WebhookSubscription>, RegistryError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    /// Resolve one subscription, `NotFound` when it is missing or owned by someone else
    pub async fn get(&self, owner_id: &str, id: Uuid) -> Result<WebhookSubscription, RegistryError> {
        self.store
            .get(owner_id, id)
            .await?
            .ok_or(RegistryError::NotFound)
    }

    /// Returns `false` when nothing owned by `owner_id` had that id
    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool, RegistryError> {
        let deleted = self.store.delete(owner_id, id).await?;
        if deleted {
            info!(owner_id = %owner_id, subscription_id = %id, "Webhook deleted");
        }
        Ok(deleted)
    }

    /// Active subscriptions of `owner_id` listening for `event`
    pub async fn match_event(
        &self,
        owner_id: &str,
        event: WebhookEvent,
    ) -> Result<Vec<WebhookSubscription>, RegistryError> {
        Ok(self.store.find_active_for_event(owner_id, event).await?)
    }
}
