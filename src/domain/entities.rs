//! Domain entities mirrored from persistent storage.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{
    ListingStatus, ListingTier, ModerationState, PaymentProviderKind, PaymentStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub tier: ListingTier,
    pub status: ListingStatus,
    pub moderation: ModerationState,
    pub views: i64,
    pub featured: bool,
    pub expires_at: Option<OffsetDateTime>,
    pub owner_id: Uuid,
    pub category_ids: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ListingRecord {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        matches!(self.status, ListingStatus::Active)
            && self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<Uuid>,
    pub active: bool,
    pub sort_order: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    /// Minor currency units (USD cents).
    pub amount_minor: i64,
    pub status: PaymentStatus,
    pub provider: PaymentProviderKind,
    /// External provider transaction id; the idempotency key for callbacks.
    /// `None` until a charge has been initiated.
    pub transaction_id: Option<String>,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub metadata: serde_json::Value,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
