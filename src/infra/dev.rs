//! Development stand-ins for collaborators that live outside this core.
//!
//! Production deployments wire real adapters for identity and object
//! storage; these keep the binary runnable without them.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::application::collaborators::{
    Actor, IdentityError, IdentityProvider, ObjectStore, ObjectStoreError,
};

/// Accepts `"<uuid>"` as a plain user and `"admin:<uuid>"` as an admin.
pub struct BearerUuidIdentity;

#[async_trait]
impl IdentityProvider for BearerUuidIdentity {
    async fn authenticate(&self, credential: &str) -> Result<Actor, IdentityError> {
        if let Some(rest) = credential.strip_prefix("admin:") {
            let id: Uuid = rest.parse().map_err(|_| IdentityError::Rejected)?;
            return Ok(Actor::admin(id));
        }
        let id: Uuid = credential.parse().map_err(|_| IdentityError::Rejected)?;
        Ok(Actor::user(id))
    }
}

/// Stores nothing; hands back synthetic URLs and logs deletions.
pub struct NullObjectStore;

#[async_trait]
impl ObjectStore for NullObjectStore {
    async fn put(&self, bytes: bytes::Bytes) -> Result<String, ObjectStoreError> {
        let url = format!("null://objects/{}", Uuid::new_v4());
        debug!(size = bytes.len(), url, "object accepted by null store");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), ObjectStoreError> {
        debug!(url, "object delete ignored by null store");
        Ok(())
    }
}
