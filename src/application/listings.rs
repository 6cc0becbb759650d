//! Listing store: creation, partial updates, views with lazy expiry, and
//! the internal status-transition path.

use std::sync::Arc;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::categories::CategoryCatalog;
use crate::application::collaborators::{Actor, ObjectStore, ObjectStoreError};
use crate::application::error::AppError;
use crate::application::repos::{
    CreateListingParams, ImageDeltas, ListingFieldPatch, ListingsRepo, RepoError,
};
use crate::domain::entities::ListingRecord;
use crate::domain::error::DomainError;
use crate::domain::listings::{allowed_sources, ensure_transition};
use crate::domain::slug::{retried_slug, timestamped_slug};
use crate::domain::types::{ListingStatus, ModerationState};

/// The timestamp suffix makes collisions rare, not impossible. The unique
/// index is authoritative; a duplicate gets a retry with a random fragment,
/// since the retry itself runs inside the same millisecond.
const SLUG_INSERT_ATTEMPTS: usize = 4;

#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category_ids: Vec<Uuid>,
}

/// Owner/admin edit request. Scalar fields merge; images move exclusively
/// through add/remove deltas; a category set, when present, replaces the
/// existing association wholesale.
#[derive(Debug, Clone, Default)]
pub struct ListingUpdate {
    pub fields: ListingFieldPatch,
    pub images: ImageDeltas,
    pub category_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Approve,
    Reject,
}

#[derive(Clone)]
pub struct ListingStore {
    repo: Arc<dyn ListingsRepo>,
    catalog: CategoryCatalog,
    objects: Arc<dyn ObjectStore>,
}

impl ListingStore {
    pub fn new(
        repo: Arc<dyn ListingsRepo>,
        catalog: CategoryCatalog,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            repo,
            catalog,
            objects,
        }
    }

    pub async fn create(
        &self,
        actor: Actor,
        listing: NewListing,
    ) -> Result<ListingRecord, AppError> {
        if listing.category_ids.is_empty() {
            return Err(DomainError::validation("a listing needs at least one category").into());
        }
        self.catalog.resolve_active(&listing.category_ids).await?;

        let mut last_conflict = None;
        for attempt in 0..SLUG_INSERT_ATTEMPTS {
            let now = OffsetDateTime::now_utc();
            let slug = if attempt == 0 {
                timestamped_slug(&listing.title, now)
            } else {
                retried_slug(&listing.title, now)
            }
            .map_err(|err| DomainError::validation(err.to_string()))?;

            let params = CreateListingParams {
                slug,
                title: listing.title.clone(),
                description: listing.description.clone(),
                price: listing.price,
                images: listing.images.clone(),
                location: listing.location.clone(),
                latitude: listing.latitude,
                longitude: listing.longitude,
                owner_id: actor.id,
                category_ids: listing.category_ids.clone(),
            };

            match self.repo.insert(params).await {
                Ok(created) => {
                    info!(listing = %created.slug, owner = %actor.id, "listing created");
                    return Ok(created);
                }
                Err(RepoError::Duplicate { constraint }) => {
                    debug!(attempt, constraint, "listing slug collision, regenerating");
                    last_conflict = Some(constraint);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(DomainError::conflict(last_conflict.unwrap_or_else(|| "listing slug".into())).into())
    }

    pub async fn update_fields(
        &self,
        listing_id: Uuid,
        actor: Actor,
        update: ListingUpdate,
    ) -> Result<ListingRecord, AppError> {
        let current = self.require(listing_id).await?;
        if !actor.can_manage(current.owner_id) {
            return Err(
                DomainError::authorization("only the owner or an admin may edit a listing").into(),
            );
        }

        if let Some(category_ids) = &update.category_ids {
            if category_ids.is_empty() {
                return Err(
                    DomainError::validation("a listing needs at least one category").into(),
                );
            }
            self.catalog.resolve_active(category_ids).await?;
        }

        let mut latest = current;
        if !update.fields.is_empty() {
            latest = self.repo.update_fields(listing_id, update.fields).await?;
        }
        if !update.images.is_empty() {
            latest = self
                .repo
                .apply_image_deltas(listing_id, update.images)
                .await?;
        }
        if let Some(category_ids) = update.category_ids {
            latest = self
                .repo
                .replace_categories(listing_id, category_ids)
                .await?;
        }

        Ok(latest)
    }

    /// Read with side effects: applies lazy expiry, then bumps the view
    /// counter. The counter is approximate under concurrent reads.
    pub async fn view(&self, listing_id: Uuid) -> Result<ListingRecord, AppError> {
        let current = self.require(listing_id).await?;
        if current.is_expired_at(OffsetDateTime::now_utc()) {
            // CAS so concurrent readers racing past expiry apply it once.
            if let Some(expired) = self
                .repo
                .transition_status(listing_id, &[ListingStatus::Active], ListingStatus::Expired)
                .await?
            {
                info!(listing = %expired.slug, "listing expired on read");
            }
        }
        Ok(self.repo.increment_views(listing_id).await?)
    }

    /// Internal transition path used by the monetization coordinator and
    /// the moderation queue; not part of the public editing surface.
    pub(crate) async fn set_status(
        &self,
        listing_id: Uuid,
        to: ListingStatus,
    ) -> Result<ListingRecord, AppError> {
        let current = self.require(listing_id).await?;
        ensure_transition(current.status, to)?;

        match self
            .repo
            .transition_status(listing_id, allowed_sources(to), to)
            .await?
        {
            Some(updated) => Ok(updated),
            // A concurrent writer moved the listing first; re-read and
            // report against the fresh state.
            None => {
                let fresh = self.require(listing_id).await?;
                ensure_transition(fresh.status, to)?;
                Err(DomainError::state(format!(
                    "listing {listing_id} changed concurrently while moving to `{}`",
                    to.as_str()
                ))
                .into())
            }
        }
    }

    pub(crate) async fn promote_tier(
        &self,
        listing_id: Uuid,
        tier: crate::domain::types::ListingTier,
    ) -> Result<ListingRecord, AppError> {
        let featured = tier == crate::domain::types::ListingTier::Featured;
        Ok(self.repo.set_tier(listing_id, tier, featured).await?)
    }

    pub async fn moderate(
        &self,
        listing_id: Uuid,
        actor: Actor,
        decision: ModerationDecision,
    ) -> Result<ListingRecord, AppError> {
        if !actor.is_admin {
            return Err(DomainError::authorization("moderation requires an admin").into());
        }

        let current = self.require(listing_id).await?;
        match decision {
            ModerationDecision::Approve => {
                let updated = self
                    .repo
                    .set_moderation(listing_id, ModerationState::Approved)
                    .await?;
                info!(listing = %updated.slug, "listing approved");
                Ok(updated)
            }
            ModerationDecision::Reject => {
                self.repo
                    .set_moderation(listing_id, ModerationState::Rejected)
                    .await?;
                let updated = match current.status {
                    ListingStatus::Pending | ListingStatus::Active => {
                        self.set_status(listing_id, ListingStatus::Draft).await?
                    }
                    _ => self.require(listing_id).await?,
                };
                info!(listing = %updated.slug, "listing rejected");
                Ok(updated)
            }
        }
    }

    pub async fn mark_sold(&self, listing_id: Uuid, actor: Actor) -> Result<ListingRecord, AppError> {
        let current = self.require(listing_id).await?;
        if !actor.can_manage(current.owner_id) {
            return Err(DomainError::authorization(
                "only the owner or an admin may mark a listing sold",
            )
            .into());
        }
        self.set_status(listing_id, ListingStatus::Sold).await
    }

    /// Immediate deletion, owner or admin. Image cleanup cascades through
    /// the object store; a missing object is logged and skipped.
    pub async fn delete(&self, listing_id: Uuid, actor: Actor) -> Result<(), AppError> {
        let current = self.require(listing_id).await?;
        if !actor.can_manage(current.owner_id) {
            return Err(
                DomainError::authorization("only the owner or an admin may delete a listing")
                    .into(),
            );
        }

        let Some(deleted) = self.repo.delete(listing_id).await? else {
            return Err(DomainError::not_found("listing").into());
        };

        for url in &deleted.images {
            match self.objects.delete(url).await {
                Ok(()) | Err(ObjectStoreError::NotFound) => {}
                Err(err) => warn!(listing = %deleted.slug, url, error = %err, "image cleanup failed"),
            }
        }
        info!(listing = %deleted.slug, "listing deleted");
        Ok(())
    }

    /// "Category X" expanded to "X or any descendant", per the live tree.
    pub async fn list_in_category(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<ListingRecord>, AppError> {
        let mut ids: Vec<Uuid> = self
            .catalog
            .descendant_ids(category_id)
            .await?
            .into_iter()
            .collect();
        ids.push(category_id);
        Ok(self.repo.active_in_categories(&ids).await?)
    }

    pub async fn fetch(&self, listing_id: Uuid) -> Result<ListingRecord, AppError> {
        self.require(listing_id).await
    }

    async fn require(&self, listing_id: Uuid) -> Result<ListingRecord, AppError> {
        self.repo
            .fetch(listing_id)
            .await?
            .ok_or_else(|| DomainError::not_found("listing").into())
    }
}
