//! Monetization coordinator: the only component that touches both the
//! payment ledger and the listing store in one operation.
//!
//! Promotion intent flows forward (client → ledger → provider); confirmation
//! flows backward (provider callback → ledger → listing). The callback path
//! commits ledger first and listing second: a crash between the two leaves a
//! completed payment with a stale listing, which is the recoverable
//! direction: money collected, visibility not yet granted.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::collaborators::{Actor, ChargeMetadata, PaymentGateway};
use crate::application::error::AppError;
use crate::application::listings::ListingStore;
use crate::application::payments::{LedgerSignal, PaymentLedger};
use crate::application::webhook;
use crate::domain::entities::ListingRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{ListingStatus, ListingTier, PaymentProviderKind};

/// What the promotion endpoint returns to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromotionOutcome {
    /// Free tier settled synchronously.
    Activated,
    /// Paid tier: the client finishes the charge with the provider using
    /// these handles; the listing activates on the provider callback.
    AwaitingPayment {
        charge_handle: String,
        client_secret: String,
    },
}

#[derive(Clone)]
pub struct MonetizationCoordinator {
    ledger: PaymentLedger,
    listings: ListingStore,
    gateway: Arc<dyn PaymentGateway>,
    signing_secret: Vec<u8>,
}

impl MonetizationCoordinator {
    pub fn new(
        ledger: PaymentLedger,
        listings: ListingStore,
        gateway: Arc<dyn PaymentGateway>,
        signing_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            ledger,
            listings,
            gateway,
            signing_secret: signing_secret.into(),
        }
    }

    /// Client intent: promote `listing_id` at `tier`.
    ///
    /// Free tier completes the ledger entry and activates the listing in one
    /// logical unit with no external call. Paid tiers open a pending entry,
    /// request a charge intent tagged with correlation metadata, and leave
    /// the listing untouched until the provider confirms. A gateway timeout
    /// surfaces as an error but keeps the entry pending; the charge may
    /// still settle and the callback will find it.
    pub async fn promote(
        &self,
        actor: Actor,
        listing_id: Uuid,
        tier: ListingTier,
    ) -> Result<PromotionOutcome, AppError> {
        let listing = self.listings.fetch(listing_id).await?;
        if !actor.can_manage(listing.owner_id) {
            return Err(DomainError::authorization(
                "only the owner or an admin may promote a listing",
            )
            .into());
        }
        if listing.status.is_terminal() {
            return Err(DomainError::state(format!(
                "listing `{}` is {} and cannot be promoted",
                listing.slug,
                listing.status.as_str()
            ))
            .into());
        }

        let record = self
            .ledger
            .open(actor.id, listing_id, tier, PaymentProviderKind::Stripe)
            .await?;

        if tier == ListingTier::Free {
            self.ledger.settle_free(record.id).await?;
            self.activate(listing_id, tier).await?;
            counter!("moorage_promotions_total", "tier" => tier.as_str()).increment(1);
            info!(listing = %listing.slug, "free promotion activated");
            return Ok(PromotionOutcome::Activated);
        }

        let metadata = ChargeMetadata {
            listing_id,
            user_id: actor.id,
            tier,
        };
        let intent = self
            .gateway
            .create_charge_intent(record.amount_minor, &metadata)
            .await?;
        self.ledger
            .attach_transaction(record.id, intent.handle.clone())
            .await?;

        counter!("moorage_promotions_total", "tier" => tier.as_str()).increment(1);
        info!(listing = %listing.slug, charge = %intent.handle, tier = tier.as_str(), "charge opened");
        Ok(PromotionOutcome::AwaitingPayment {
            charge_handle: intent.handle,
            client_secret: intent.client_secret,
        })
    }

    /// Provider callback entry point: raw payload plus signature header.
    ///
    /// Order of operations is load-bearing. 1) authenticate the payload
    /// before deserializing any business field; 2) apply the outcome to the
    /// ledger through the idempotency key; 3) only then touch the listing.
    /// Any failure before step 3 leaves both records exactly as they were.
    pub async fn handle_provider_callback(
        &self,
        raw_payload: &[u8],
        signature_header: &str,
    ) -> Result<(), AppError> {
        counter!("moorage_webhook_received_total").increment(1);

        if !webhook::verify_signature(raw_payload, signature_header, &self.signing_secret) {
            counter!("moorage_webhook_rejected_total").increment(1);
            return Err(DomainError::authentication("callback signature verification failed").into());
        }

        let Some(event) = webhook::parse_event(raw_payload)? else {
            // Unhandled event type: acknowledge so the provider stops
            // retrying, mutate nothing.
            return Ok(());
        };

        match self
            .ledger
            .apply_provider_event(&event.transaction_id, event.outcome)
            .await?
        {
            LedgerSignal::Activate(record) => {
                self.activate(record.listing_id, event.metadata.tier).await?;
                info!(
                    listing = %record.listing_id,
                    transaction = %event.transaction_id,
                    "listing activated by provider callback"
                );
            }
            LedgerSignal::AlreadyApplied(_) => {
                counter!("moorage_webhook_replayed_total").increment(1);
            }
            LedgerSignal::Failed(record) => {
                warn!(
                    listing = %record.listing_id,
                    transaction = %event.transaction_id,
                    outcome = ?event.outcome,
                    "charge did not succeed; listing left unchanged"
                );
            }
        }

        Ok(())
    }

    /// Apply the purchased tier and move the listing to `active`. A listing
    /// that is already active (free promotion racing a paid one, or a replay
    /// that slipped past the ledger guard) only has its tier refreshed.
    async fn activate(&self, listing_id: Uuid, tier: ListingTier) -> Result<ListingRecord, AppError> {
        let updated = self.listings.promote_tier(listing_id, tier).await?;
        if updated.status == ListingStatus::Active {
            return Ok(updated);
        }
        self.listings
            .set_status(listing_id, ListingStatus::Active)
            .await
    }
}
