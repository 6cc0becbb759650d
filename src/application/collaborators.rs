//! External collaborators consumed as interfaces only.
//!
//! Credential verification, binary storage, and the payment provider all
//! live behind traits; the application layer never sees their transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::types::ListingTier;

/// Opaque authenticated actor handed back by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: Uuid) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, is_admin: true }
    }

    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.is_admin || self.id == owner_id
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("credential rejected")]
    Rejected,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<Actor, IdentityError>;
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found")]
    NotFound,
    #[error("object store failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: bytes::Bytes) -> Result<String, ObjectStoreError>;
    async fn delete(&self, url: &str) -> Result<(), ObjectStoreError>;
}

/// Correlation metadata attached to every charge intent so the provider
/// echoes it back in the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeMetadata {
    pub listing_id: Uuid,
    pub user_id: Uuid,
    pub tier: ListingTier,
}

/// Handle returned by the provider for a newly opened charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeIntent {
    pub handle: String,
    pub client_secret: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("charge request timed out")]
    Timeout,
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a charge with the external provider. Bounded by the adapter's
    /// timeout; a timeout error leaves the local ledger entry pending since
    /// the charge may still settle asynchronously.
    async fn create_charge_intent(
        &self,
        amount_minor: i64,
        metadata: &ChargeMetadata,
    ) -> Result<ChargeIntent, GatewayError>;
}
