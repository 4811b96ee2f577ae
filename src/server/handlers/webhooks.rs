use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::outbound::webhook::{
    NewSubscription, RegistryError, TestDeliveryResult, WebhookSubscription,
};
use crate::server::AppState;
use crate::server::extractors::{ApiJson, OwnerId};
use crate::server::responses::{ApiError, ListResponse};

#[derive(Debug, Deserialize)]
pub struct TestWebhookRequest {
    pub webhook_id: String,
}

/// An id that is not a UUID cannot name any subscription.
fn parse_webhook_id(raw: &str) -> Result<Uuid, RegistryError> {
    Uuid::parse_str(raw).map_err(|_| RegistryError::NotFound)
}

pub async fn register_webhook(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    ApiJson(request): ApiJson<NewSubscription>,
) -> Result<(StatusCode, Json<WebhookSubscription>), ApiError> {
    let subscription = state.notifier.register(&owner_id, request).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn list_webhooks(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
) -> Result<Json<ListResponse<WebhookSubscription>>, ApiError> {
    let subscriptions = state.notifier.list(&owner_id).await?;
    Ok(Json(ListResponse::new(subscriptions)))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_webhook_id(&id)?;
    if state.notifier.delete(&owner_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RegistryError::NotFound.into())
    }
}

/// Synchronous probe; the verdict is returned even when delivery failed.
pub async fn test_webhook(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    ApiJson(request): ApiJson<TestWebhookRequest>,
) -> Result<Json<TestDeliveryResult>, ApiError> {
    let id = parse_webhook_id(&request.webhook_id)?;
    let result = state.notifier.test(&owner_id, id).await?;
    Ok(Json(result))
}
