//! Repository traits describing persistence adapters.
//!
//! Every service receives its stores through these traits; nothing in the
//! application layer reaches for an ambient connection. Multi-step updates
//! that must not lose races (webhook completion, status transitions, image
//! deltas) are expressed as single compare-and-set methods so each adapter
//! can implement them atomically.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{CategoryRecord, ListingRecord, PaymentRecord};
use crate::domain::types::{
    ListingStatus, ListingTier, ModerationState, PaymentProviderKind, PaymentStatus,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: i32,
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn insert(&self, params: CreateCategoryParams) -> Result<CategoryRecord, RepoError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<CategoryRecord>, RepoError>;
    /// Full table snapshot for arena-based traversal.
    async fn snapshot(&self) -> Result<Vec<CategoryRecord>, RepoError>;
    async fn set_parent(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<CategoryRecord, RepoError>;
    async fn set_active(&self, id: Uuid, active: bool) -> Result<CategoryRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateListingParams {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub owner_id: Uuid,
    pub category_ids: Vec<Uuid>,
}

/// Partial scalar update; `None` leaves the field untouched. Images are
/// deliberately absent here; they only move through [`ImageDeltas`].
#[derive(Debug, Clone, Default)]
pub struct ListingFieldPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub expires_at: Option<Option<OffsetDateTime>>,
}

impl ListingFieldPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.location.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.expires_at.is_none()
    }
}

/// Explicit add/remove deltas keep concurrent image edits commutative:
/// two writers each applying their own delta converge to the union-minus-
/// removals regardless of interleaving.
#[derive(Debug, Clone, Default)]
pub struct ImageDeltas {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl ImageDeltas {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[async_trait]
pub trait ListingsRepo: Send + Sync {
    async fn insert(&self, params: CreateListingParams) -> Result<ListingRecord, RepoError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<ListingRecord>, RepoError>;
    async fn update_fields(
        &self,
        id: Uuid,
        patch: ListingFieldPatch,
    ) -> Result<ListingRecord, RepoError>;
    /// Atomic read-modify-write of the image list.
    async fn apply_image_deltas(
        &self,
        id: Uuid,
        deltas: ImageDeltas,
    ) -> Result<ListingRecord, RepoError>;
    async fn replace_categories(
        &self,
        id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<ListingRecord, RepoError>;
    /// Best-effort counter bump; approximate under concurrency is fine.
    async fn increment_views(&self, id: Uuid) -> Result<ListingRecord, RepoError>;
    /// Compare-and-set: moves to `to` only while the current status is in
    /// `from`. `Ok(None)` means the guard did not hold.
    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ListingStatus],
        to: ListingStatus,
    ) -> Result<Option<ListingRecord>, RepoError>;
    async fn set_tier(
        &self,
        id: Uuid,
        tier: ListingTier,
        featured: bool,
    ) -> Result<ListingRecord, RepoError>;
    async fn set_moderation(
        &self,
        id: Uuid,
        state: ModerationState,
    ) -> Result<ListingRecord, RepoError>;
    async fn delete(&self, id: Uuid) -> Result<Option<ListingRecord>, RepoError>;
    /// Active listings attached to any of `category_ids`.
    async fn active_in_categories(
        &self,
        category_ids: &[Uuid],
    ) -> Result<Vec<ListingRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePaymentParams {
    pub amount_minor: i64,
    pub provider: PaymentProviderKind,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub metadata: serde_json::Value,
    pub status: PaymentStatus,
}

#[async_trait]
pub trait PaymentsRepo: Send + Sync {
    async fn insert(&self, params: CreatePaymentParams) -> Result<PaymentRecord, RepoError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<PaymentRecord>, RepoError>;
    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError>;
    async fn attach_transaction(
        &self,
        id: Uuid,
        transaction_id: String,
    ) -> Result<PaymentRecord, RepoError>;
    /// Compare-and-set `pending → completed` keyed by provider transaction
    /// id. `Ok(None)` when no pending record matched, so two concurrent
    /// deliveries of the same event can never both apply.
    async fn complete_where_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError>;
    /// Compare-and-set `pending → failed` keyed by transaction id.
    async fn fail_where_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError>;
    /// Compare-and-set `completed → refunded`; the eligibility window is
    /// checked by the caller, the status guard here closes the race.
    async fn refund_where_completed(
        &self,
        id: Uuid,
        reason: String,
        at: OffsetDateTime,
    ) -> Result<Option<PaymentRecord>, RepoError>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>, RepoError>;
}
