use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::canonical::to_canonical_json;
use crate::domain::events::{TEST_EVENT, WebhookEvent};

/// Body POSTed to subscriber endpoints.
///
/// Field names on the wire are fixed: `event`, `timestamp`, `data`, `user_id`.
/// A payload is immutable once built; one instance is shared by every
/// delivery of the same trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPayload {
    #[serde(rename = "event")]
    event_type: String,

    timestamp: String,

    data: Value,

    #[serde(rename = "user_id")]
    owner_id: String,
}

impl DeliveryPayload {
    /// Payload for a domain event, stamped with the current time
    pub fn for_event(event: WebhookEvent, owner_id: impl Into<String>, data: Value) -> Self {
        Self::new(event.as_str(), OffsetDateTime::now_utc(), owner_id, data)
    }

    /// Fixed payload used to probe a subscription
    pub fn test(owner_id: impl Into<String>) -> Self {
        Self::new(
            TEST_EVENT,
            OffsetDateTime::now_utc(),
            owner_id,
            json!({"message": "This is a test webhook delivery"}),
        )
    }

    pub fn new(
        event_type: impl Into<String>,
        timestamp: OffsetDateTime,
        owner_id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: format_timestamp(timestamp),
            data,
            owner_id: owner_id.into(),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Canonical JSON rendering; these exact bytes are signed and sent
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        to_canonical_json(self)
    }
}

/// ISO-8601 UTC with second precision, e.g. `2025-01-10T12:00:00Z`
fn format_timestamp(timestamp: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    match timestamp.to_offset(UtcOffset::UTC).format(format) {
        Ok(formatted) => formatted,
        Err(_) => unreachable!("every component of the format is present on OffsetDateTime"),
    }
}

/// Classification of a single delivery attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Response with a status below 300
    Delivered,

    /// Any other HTTP response
    HttpError,

    /// DNS, connect, TLS or protocol failure
    TransportError,

    Timeout,
}

/// Result of one POST attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub kind: OutcomeKind,

    pub status_code: Option<u16>,

    pub error: Option<String>,

    pub elapsed: Duration,
}

impl AttemptOutcome {
    /// An attempt that received an HTTP response
    pub fn response(status_code: u16, elapsed: Duration) -> Self {
        if status_code < 300 {
            Self {
                kind: OutcomeKind::Delivered,
                status_code: Some(status_code),
                error: None,
                elapsed,
            }
        } else {
            Self {
                kind: OutcomeKind::HttpError,
                status_code: Some(status_code),
                error: Some(format!("Endpoint responded with status {status_code}")),
                elapsed,
            }
        }
    }

    /// An attempt that never received a response
    pub fn failed(kind: OutcomeKind, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            kind,
            status_code: None,
            error: Some(error.into()),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Delivered
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// One attempt inside a subscription's retry loop. Lives only as long as the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryAttempt {
    pub subscription_id: Uuid,

    /// 1-based
    pub attempt: u32,

    pub outcome: AttemptOutcome,
}

/// Terminal state of a retry loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Succeeded,

    /// Every attempt failed; the delivery was abandoned
    Exhausted,
}

/// Summary of one subscription's retry loop, used for logging and tests
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub subscription_id: Uuid,

    pub state: DeliveryState,

    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.last().map(|a| a.attempt).unwrap_or(0)
    }

    pub fn last_outcome(&self) -> Option<&AttemptOutcome> {
        self.attempts.last().map(|a| &a.outcome)
    }

    pub fn succeeded(&self) -> bool {
        self.state == DeliveryState::Succeeded
    }
}

/// Verdict of a synchronous single-attempt probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestDeliveryResult {
    pub success: bool,

    pub status_code: Option<u16>,

    pub elapsed_ms: u64,

    pub error: Option<String>,
}

impl From<AttemptOutcome> for TestDeliveryResult {
    fn from(outcome: AttemptOutcome) -> Self {
        Self {
            success: outcome.is_success(),
            status_code: outcome.status_code,
            elapsed_ms: outcome.elapsed_ms(),
            error: outcome.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_payload_wire_field_names() -> Result<(), serde_json::Error> {
        let payload = DeliveryPayload::new(
            "resource.created",
            datetime!(2025-01-10 12:00:00 UTC),
            "owner-1",
            json!({"resource_id": "r-1"}),
        );

        let value = serde_json::to_value(&payload)?;

        assert_eq!(
            value,
            json!({
                "event": "resource.created",
                "timestamp": "2025-01-10T12:00:00Z",
                "data": {"resource_id": "r-1"},
                "user_id": "owner-1",
            })
        );
        Ok(())
    }

    #[test]
    fn test_timestamp_is_normalised_to_utc() {
        let payload = DeliveryPayload::new(
            "resource.updated",
            datetime!(2025-01-10 14:30:05 +2),
            "owner-1",
            json!({}),
        );

        assert_eq!(payload.timestamp(), "2025-01-10T12:30:05Z");
    }

    #[test]
    fn test_canonical_json_is_sorted() -> Result<(), serde_json::Error> {
        let payload = DeliveryPayload::new(
            "search.completed",
            datetime!(2025-01-10 12:00:00 UTC),
            "owner-1",
            json!({"query": "rust", "count": 3}),
        );

        assert_eq!(
            payload.to_canonical_json()?,
            r#"{"data": {"count": 3, "query": "rust"}, "event": "search.completed", "timestamp": "2025-01-10T12:00:00Z", "user_id": "owner-1"}"#
        );
        Ok(())
    }

    #[test]
    fn test_for_event_uses_wire_tag() {
        let payload =
            DeliveryPayload::for_event(WebhookEvent::CollectionCreated, "owner-1", json!({}));

        assert_eq!(payload.event_type(), "collection.created");
        assert_eq!(payload.owner_id(), "owner-1");
        assert!(payload.timestamp().ends_with('Z'));
    }

    #[test]
    fn test_test_payload() {
        let payload = DeliveryPayload::test("owner-1");

        assert_eq!(payload.event_type(), "webhook.test");
        assert_eq!(
            payload.data(),
            &json!({"message": "This is a test webhook delivery"})
        );
    }

    #[test]
    fn test_outcome_success_boundary() {
        let ok = AttemptOutcome::response(299, Duration::from_millis(10));
        assert!(ok.is_success());
        assert!(ok.error.is_none());

        let redirect = AttemptOutcome::response(300, Duration::from_millis(10));
        assert!(!redirect.is_success());
        assert_eq!(redirect.kind, OutcomeKind::HttpError);
        assert_eq!(redirect.status_code, Some(300));
    }

    #[test]
    fn test_failed_outcome_has_no_status() {
        let outcome = AttemptOutcome::failed(
            OutcomeKind::Timeout,
            "Request timeout after 5s",
            Duration::from_secs(5),
        );

        assert!(!outcome.is_success());
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.elapsed_ms(), 5000);
    }

    #[test]
    fn test_report_accessors() {
        let sub_id = Uuid::new_v4();
        let report = DeliveryReport {
            subscription_id: sub_id,
            state: DeliveryState::Succeeded,
            attempts: vec![
                DeliveryAttempt {
                    subscription_id: sub_id,
                    attempt: 1,
                    outcome: AttemptOutcome::response(500, Duration::from_millis(3)),
                },
                DeliveryAttempt {
                    subscription_id: sub_id,
                    attempt: 2,
                    outcome: AttemptOutcome::response(200, Duration::from_millis(4)),
                },
            ],
        };

        assert_eq!(report.attempt_count(), 2);
        assert!(report.succeeded());
        assert_eq!(report.last_outcome().and_then(|o| o.status_code), Some(200));
    }

    #[test]
    fn test_test_result_from_outcome() -> Result<(), serde_json::Error> {
        let result = TestDeliveryResult::from(AttemptOutcome::response(
            204,
            Duration::from_millis(52),
        ));

        assert_eq!(
            serde_json::to_value(&result)?,
            json!({"success": true, "status_code": 204, "elapsed_ms": 52, "error": null})
        );
        Ok(())
    }

    #[test]
    fn test_outcome_kind_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&OutcomeKind::TransportError)?,
            r#""transport_error""#
        );
        assert_eq!(
            serde_json::to_string(&DeliveryState::Exhausted)?,
            r#""exhausted""#
        );
        Ok(())
    }
}
