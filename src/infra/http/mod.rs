//! Produced HTTP surface: the promotion endpoint and the provider callback.
//! Everything else (full CRUD, search, messaging) lives outside this core.

pub mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::application::collaborators::IdentityProvider;
use crate::application::monetization::MonetizationCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<MonetizationCoordinator>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/listings/{id}/promote", post(handlers::promote_listing))
        .route("/webhooks/payments", post(handlers::provider_callback))
        .with_state(state)
}
