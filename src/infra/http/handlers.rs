use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::application::collaborators::Actor;
use crate::application::monetization::PromotionOutcome;
use crate::domain::types::ListingTier;

use super::AppState;
use super::error::ApiError;

const SIGNATURE_HEADER: &str = "x-provider-signature";

#[derive(Deserialize)]
pub struct PromoteRequest {
    pub tier: ListingTier,
}

pub async fn promote_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<PromoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authenticate(&state, &headers).await?;

    let outcome = state
        .coordinator
        .promote(actor, listing_id, request.tier)
        .await?;

    Ok(match outcome {
        PromotionOutcome::Activated => Json(json!({ "status": "activated" })),
        PromotionOutcome::AwaitingPayment {
            charge_handle,
            client_secret,
        } => Json(json!({
            "charge_handle": charge_handle,
            "client_secret": client_secret,
        })),
    })
}

/// Callback acknowledgement contract: the provider retries on any non-2xx,
/// so the flat success body is returned only after state was durably
/// applied. No business data leaks back to the provider.
pub async fn provider_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    state
        .coordinator
        .handle_provider_callback(&body, signature)
        .await?;

    Ok(Json(json!({ "received": true })))
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Actor, ApiError> {
    let credential = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthorized)?;

    state
        .identity
        .authenticate(credential)
        .await
        .map_err(|_| ApiError::unauthorized())
}
