use crate::domain::events::WebhookEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// An owner's registered interest in a set of events.
///
/// The signing secret is write-only: it is skipped on serialization and
/// redacted from `Debug` output, so no read path can leak it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookSubscription {
    pub id: Uuid,

    #[serde(rename = "user_id")]
    pub owner_id: String,

    pub url: String,

    pub events: BTreeSet<WebhookEvent>,

    #[serde(skip_serializing, default)]
    pub signing_secret: Option<String>,

    pub is_active: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl WebhookSubscription {
    /// Create an active subscription with a fresh id and creation time
    pub fn new(
        owner_id: impl Into<String>,
        url: impl Into<String>,
        events: impl IntoIterator<Item = WebhookEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            url: url.into(),
            events: events.into_iter().collect(),
            signing_secret: None,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Set a per-subscription signing secret
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    /// Whether this subscription should receive a given event
    pub fn matches_event(&self, event: WebhookEvent) -> bool {
        self.is_active && self.events.contains(&event)
    }

    /// The secret deliveries to this subscription are signed with
    pub fn effective_secret<'a>(&'a self, default_secret: &'a str) -> &'a str {
        self.signing_secret.as_deref().unwrap_or(default_secret)
    }

    pub fn disable(&mut self) {
        self.is_active = false;
    }

    pub fn enable(&mut self) {
        self.is_active = true;
    }
}

impl fmt::Debug for WebhookSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSubscription")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("url", &self.url)
            .field("events", &self.events)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .finish()
    }
}
