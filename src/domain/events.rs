use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag carried by the synthetic payload sent when a subscription is probed.
///
/// It is not part of [`WebhookEvent`], so nobody can subscribe to it.
pub const TEST_EVENT: &str = "webhook.test";

/// Domain events a subscription can ask to be notified about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "resource.created")]
    ResourceCreated,
    #[serde(rename = "resource.updated")]
    ResourceUpdated,
    #[serde(rename = "resource.deleted")]
    ResourceDeleted,
    #[serde(rename = "search.completed")]
    SearchCompleted,
    #[serde(rename = "collection.created")]
    CollectionCreated,
    #[serde(rename = "collection.updated")]
    CollectionUpdated,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 6] = [
        WebhookEvent::ResourceCreated,
        WebhookEvent::ResourceUpdated,
        WebhookEvent::ResourceDeleted,
        WebhookEvent::SearchCompleted,
        WebhookEvent::CollectionCreated,
        WebhookEvent::CollectionUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::ResourceCreated => "resource.created",
            WebhookEvent::ResourceUpdated => "resource.updated",
            WebhookEvent::ResourceDeleted => "resource.deleted",
            WebhookEvent::SearchCompleted => "search.completed",
            WebhookEvent::CollectionCreated => "collection.created",
            WebhookEvent::CollectionUpdated => "collection.updated",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event type: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for WebhookEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}
