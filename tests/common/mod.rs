//! Shared fixtures: in-memory stack plus a recording fake gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use tokio::sync::Mutex;
use uuid::Uuid;

use moorage::application::categories::{CategoryCatalog, NewCategory};
use moorage::application::collaborators::{
    Actor, ChargeIntent, ChargeMetadata, GatewayError, ObjectStore, ObjectStoreError,
    PaymentGateway,
};
use moorage::application::listings::{ListingStore, NewListing};
use moorage::application::monetization::MonetizationCoordinator;
use moorage::application::payments::PaymentLedger;
use moorage::domain::entities::{CategoryRecord, ListingRecord};
use moorage::domain::types::ListingTier;
use moorage::infra::memory::MemoryStore;

pub const SIGNING_SECRET: &[u8] = b"whsec_integration_secret";

/// Gateway double: returns deterministic intents and records every call.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicU64,
    calls: Mutex<Vec<(i64, ChargeMetadata)>>,
}

impl FakeGateway {
    pub async fn calls(&self) -> Vec<(i64, ChargeMetadata)> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_charge_intent(
        &self,
        amount_minor: i64,
        metadata: &ChargeMetadata,
    ) -> Result<ChargeIntent, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push((amount_minor, metadata.clone()));
        Ok(ChargeIntent {
            handle: format!("pi_test_{n}"),
            client_secret: format!("pi_test_{n}_secret"),
        })
    }
}

/// Object store double that records deletions.
#[derive(Default)]
pub struct RecordingObjectStore {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put(&self, _bytes: bytes::Bytes) -> Result<String, ObjectStoreError> {
        Ok(format!("mem://objects/{}", Uuid::new_v4()))
    }

    async fn delete(&self, url: &str) -> Result<(), ObjectStoreError> {
        self.deleted.lock().await.push(url.to_string());
        Ok(())
    }
}

pub struct TestEnv {
    pub catalog: CategoryCatalog,
    pub listings: ListingStore,
    pub ledger: PaymentLedger,
    pub coordinator: Arc<MonetizationCoordinator>,
    pub gateway: Arc<FakeGateway>,
    pub objects: Arc<RecordingObjectStore>,
}

pub fn env() -> TestEnv {
    let store = MemoryStore::new();
    let gateway = Arc::new(FakeGateway::default());
    let objects = Arc::new(RecordingObjectStore::default());

    let catalog = CategoryCatalog::new(store.clone());
    let listings = ListingStore::new(store.clone(), catalog.clone(), objects.clone());
    let ledger = PaymentLedger::new(store.clone(), store.clone());
    let coordinator = Arc::new(MonetizationCoordinator::new(
        ledger.clone(),
        listings.clone(),
        gateway.clone(),
        SIGNING_SECRET,
    ));

    TestEnv {
        catalog,
        listings,
        ledger,
        coordinator,
        gateway,
        objects,
    }
}

pub async fn make_category(catalog: &CategoryCatalog, name: &str, parent: Option<Uuid>) -> CategoryRecord {
    catalog
        .create_node(NewCategory {
            name: name.to_string(),
            description: None,
            icon: None,
            parent_id: parent,
            sort_order: 0,
        })
        .await
        .expect("create category")
}

pub async fn make_listing(
    listings: &ListingStore,
    owner: Actor,
    title: &str,
    category: Uuid,
) -> ListingRecord {
    listings
        .create(
            owner,
            NewListing {
                title: title.to_string(),
                description: "A fine vessel.".to_string(),
                price: Decimal::new(15_000_00, 2),
                images: vec![],
                location: "Annapolis, MD".to_string(),
                latitude: None,
                longitude: None,
                category_ids: vec![category],
            },
        )
        .await
        .expect("create listing")
}

/// Sign a payload the way the provider would.
pub fn sign(payload: &[u8]) -> String {
    sign_with(payload, SIGNING_SECRET)
}

pub fn sign_with(payload: &[u8], secret: &[u8]) -> String {
    let timestamp = "1767225600";
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("hmac key");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let digest = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={digest}")
}

pub fn charge_event(
    event_type: &str,
    transaction_id: &str,
    listing_id: Uuid,
    user_id: Uuid,
    tier: ListingTier,
) -> Vec<u8> {
    serde_json::json!({
        "id": format!("evt_{transaction_id}"),
        "type": event_type,
        "data": {"object": {
            "id": transaction_id,
            "metadata": {
                "listing_id": listing_id.to_string(),
                "user_id": user_id.to_string(),
                "tier": match tier {
                    ListingTier::Free => "free",
                    ListingTier::Premium => "premium",
                    ListingTier::Featured => "featured",
                },
            }
        }}
    })
    .to_string()
    .into_bytes()
}
