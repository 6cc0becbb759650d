//! In-process repositories backed by `DashMap`.
//!
//! Used by the test suite and for local development without Postgres. Each
//! compare-and-set method mutates through a single map entry guard, which
//! gives the same "one winner" semantics the SQL adapters get from guarded
//! `UPDATE ... WHERE` statements.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CategoriesRepo, CreateCategoryParams, CreateListingParams, CreatePaymentParams, ImageDeltas,
    ListingFieldPatch, ListingsRepo, PaymentsRepo, RepoError,
};
use crate::domain::entities::{CategoryRecord, ListingRecord, PaymentRecord};
use crate::domain::payments;
use crate::domain::types::{ListingStatus, ListingTier, ModerationState, PaymentStatus};

#[derive(Default)]
pub struct MemoryStore {
    categories: DashMap<Uuid, CategoryRecord>,
    category_slugs: DashMap<String, Uuid>,
    listings: DashMap<Uuid, ListingRecord>,
    listing_slugs: DashMap<String, Uuid>,
    payments: DashMap<Uuid, PaymentRecord>,
    payments_by_txn: DashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl CategoriesRepo for MemoryStore {
    async fn insert(&self, params: CreateCategoryParams) -> Result<CategoryRecord, RepoError> {
        let id = Uuid::new_v4();
        match self.category_slugs.entry(params.slug.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Duplicate {
                    constraint: "categories_slug_key".to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let record = CategoryRecord {
            id,
            slug: params.slug,
            name: params.name,
            description: params.description,
            icon: params.icon,
            parent_id: params.parent_id,
            active: true,
            sort_order: params.sort_order,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.categories.get(&id).map(|entry| entry.value().clone()))
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.categories.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn snapshot(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(self
            .categories
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set_parent(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<CategoryRecord, RepoError> {
        let mut entry = self.categories.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.parent_id = parent_id;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<CategoryRecord, RepoError> {
        let mut entry = self.categories.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.active = active;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl ListingsRepo for MemoryStore {
    async fn insert(&self, params: CreateListingParams) -> Result<ListingRecord, RepoError> {
        let id = Uuid::new_v4();
        match self.listing_slugs.entry(params.slug.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Duplicate {
                    constraint: "listings_slug_key".to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = OffsetDateTime::now_utc();
        let record = ListingRecord {
            id,
            slug: params.slug,
            title: params.title,
            description: params.description,
            price: params.price,
            images: params.images,
            location: params.location,
            latitude: params.latitude,
            longitude: params.longitude,
            tier: ListingTier::Free,
            status: ListingStatus::Draft,
            moderation: ModerationState::Pending,
            views: 0,
            featured: false,
            expires_at: None,
            owner_id: params.owner_id,
            category_ids: params.category_ids,
            created_at: now,
            updated_at: now,
        };
        self.listings.insert(id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ListingRecord>, RepoError> {
        Ok(self.listings.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: ListingFieldPatch,
    ) -> Result<ListingRecord, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(title) = patch.title {
            entry.title = title;
        }
        if let Some(description) = patch.description {
            entry.description = description;
        }
        if let Some(price) = patch.price {
            entry.price = price;
        }
        if let Some(location) = patch.location {
            entry.location = location;
        }
        if let Some(latitude) = patch.latitude {
            entry.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            entry.longitude = longitude;
        }
        if let Some(expires_at) = patch.expires_at {
            entry.expires_at = expires_at;
        }
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn apply_image_deltas(
        &self,
        id: Uuid,
        deltas: ImageDeltas,
    ) -> Result<ListingRecord, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        for url in deltas.add {
            if !entry.images.contains(&url) {
                entry.images.push(url);
            }
        }
        entry.images.retain(|url| !deltas.remove.contains(url));
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn replace_categories(
        &self,
        id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<ListingRecord, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.category_ids = category_ids;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn increment_views(&self, id: Uuid) -> Result<ListingRecord, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.views += 1;
        Ok(entry.value().clone())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ListingStatus],
        to: ListingStatus,
    ) -> Result<Option<ListingRecord>, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        if !from.contains(&entry.status) {
            return Ok(None);
        }
        entry.status = to;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(Some(entry.value().clone()))
    }

    async fn set_tier(
        &self,
        id: Uuid,
        tier: ListingTier,
        featured: bool,
    ) -> Result<ListingRecord, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.tier = tier;
        entry.featured = featured;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn set_moderation(
        &self,
        id: Uuid,
        state: ModerationState,
    ) -> Result<ListingRecord, RepoError> {
        let mut entry = self.listings.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.moderation = state;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ListingRecord>, RepoError> {
        let removed = self.listings.remove(&id).map(|(_, record)| record);
        if let Some(record) = &removed {
            self.listing_slugs.remove(&record.slug);
        }
        Ok(removed)
    }

    async fn active_in_categories(
        &self,
        category_ids: &[Uuid],
    ) -> Result<Vec<ListingRecord>, RepoError> {
        let mut out: Vec<ListingRecord> = self
            .listings
            .iter()
            .filter(|entry| {
                entry.status == ListingStatus::Active
                    && entry
                        .category_ids
                        .iter()
                        .any(|id| category_ids.contains(id))
            })
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| {
            b.featured
                .cmp(&a.featured)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }
}

#[async_trait]
impl PaymentsRepo for MemoryStore {
    async fn insert(&self, params: CreatePaymentParams) -> Result<PaymentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            amount_minor: params.amount_minor,
            status: params.status,
            provider: params.provider,
            transaction_id: None,
            user_id: params.user_id,
            listing_id: params.listing_id,
            metadata: params.metadata,
            refund_reason: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<PaymentRecord>, RepoError> {
        Ok(self.payments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let Some(id) = self.payments_by_txn.get(transaction_id).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.payments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn attach_transaction(
        &self,
        id: Uuid,
        transaction_id: String,
    ) -> Result<PaymentRecord, RepoError> {
        if !self.payments.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        match self.payments_by_txn.entry(transaction_id.clone()) {
            Entry::Occupied(existing) if *existing.get() != id => {
                return Err(RepoError::Duplicate {
                    constraint: "payments_transaction_id_key".to_string(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        let mut entry = self.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.transaction_id = Some(transaction_id);
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.value().clone())
    }

    async fn complete_where_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let Some(id) = self.payments_by_txn.get(transaction_id).map(|e| *e) else {
            return Ok(None);
        };
        let mut entry = self.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
        if !payments::can_transition(entry.status, PaymentStatus::Completed) {
            return Ok(None);
        }
        entry.status = PaymentStatus::Completed;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(Some(entry.value().clone()))
    }

    async fn fail_where_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let Some(id) = self.payments_by_txn.get(transaction_id).map(|e| *e) else {
            return Ok(None);
        };
        let mut entry = self.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
        if !payments::can_transition(entry.status, PaymentStatus::Failed) {
            return Ok(None);
        }
        entry.status = PaymentStatus::Failed;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(Some(entry.value().clone()))
    }

    async fn refund_where_completed(
        &self,
        id: Uuid,
        reason: String,
        at: OffsetDateTime,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let mut entry = self.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
        if !payments::can_transition(entry.status, PaymentStatus::Refunded)
            || entry.refunded_at.is_some()
        {
            return Ok(None);
        }
        entry.status = PaymentStatus::Refunded;
        entry.refund_reason = Some(reason);
        entry.refunded_at = Some(at);
        entry.updated_at = at;
        Ok(Some(entry.value().clone()))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>, RepoError> {
        let mut out: Vec<PaymentRecord> = self
            .payments
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
