// Webhook delivery module
//
// Subscription management:
//   subscription, registry, memory_store
//
// Delivery pipeline:
//   canonical, hmac_signer, http_client, retry_strategy, dispatcher, schemas
//
// notifier ties both halves together and is what the rest of the app calls.

pub mod canonical;
pub mod dispatcher;
pub mod hmac_signer;
pub mod http_client;
pub mod memory_store;
pub mod notifier;
pub mod registry;
pub mod retry_strategy;
pub mod schemas;
pub mod subscription;

// Re-export commonly used types
pub use dispatcher::WebhookDispatcher;
pub use hmac_signer::{HmacSigner, format_signature_header, parse_signature_header};
pub use http_client::{HttpClientError, WebhookHttpClient};
pub use memory_store::InMemorySubscriptionStore;
pub use notifier::{DispatchHandle, WebhookNotifier};
pub use registry::{NewSubscription, RegistryError, SubscriptionRegistry};
pub use retry_strategy::RetryStrategy;
pub use schemas::{
    AttemptOutcome, DeliveryAttempt, DeliveryPayload, DeliveryReport, DeliveryState, OutcomeKind,
    TestDeliveryResult,
};
pub use subscription::WebhookSubscription;
