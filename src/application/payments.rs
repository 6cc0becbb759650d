//! Payment ledger: pending charge records and idempotent application of
//! provider outcomes.

use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{CreatePaymentParams, ListingsRepo, PaymentsRepo};
use crate::application::webhook::ChargeOutcome;
use crate::domain::entities::PaymentRecord;
use crate::domain::error::DomainError;
use crate::domain::payments::{ensure_refundable, tier_amount_minor};
use crate::domain::types::{ListingTier, PaymentProviderKind, PaymentStatus};

/// What the coordinator should do after a provider event was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerSignal {
    /// First successful application: activate the associated listing.
    Activate(PaymentRecord),
    /// Redelivery of an already-applied success: acknowledge, touch nothing.
    AlreadyApplied(PaymentRecord),
    /// Charge failed: the listing stays as it was.
    Failed(PaymentRecord),
}

#[derive(Clone)]
pub struct PaymentLedger {
    repo: Arc<dyn PaymentsRepo>,
    listings: Arc<dyn ListingsRepo>,
}

impl PaymentLedger {
    pub fn new(repo: Arc<dyn PaymentsRepo>, listings: Arc<dyn ListingsRepo>) -> Self {
        Self { repo, listings }
    }

    /// Open a `pending` ledger entry for a promotion attempt. The amount
    /// comes from the fixed tier table; the transaction id stays empty until
    /// a charge is actually initiated.
    pub async fn open(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
        tier: ListingTier,
        provider: PaymentProviderKind,
    ) -> Result<PaymentRecord, AppError> {
        if self.listings.fetch(listing_id).await?.is_none() {
            return Err(DomainError::not_found("listing").into());
        }

        let record = self
            .repo
            .insert(CreatePaymentParams {
                amount_minor: tier_amount_minor(tier),
                provider,
                user_id,
                listing_id,
                metadata: json!({ "tier": tier.as_str() }),
                status: PaymentStatus::Pending,
            })
            .await?;

        info!(payment = %record.id, listing = %listing_id, tier = tier.as_str(), "payment opened");
        Ok(record)
    }

    /// Record the provider's transaction id once the charge intent exists.
    pub async fn attach_transaction(
        &self,
        record_id: Uuid,
        transaction_id: String,
    ) -> Result<PaymentRecord, AppError> {
        self.repo
            .attach_transaction(record_id, transaction_id)
            .await
            .map_err(|err| AppError::from_repo_as_domain(err, "payment"))
    }

    /// Mark a zero-amount record completed immediately (free tier), bypassing
    /// the provider round-trip. Still goes through the pending→completed CAS.
    pub async fn settle_free(&self, record_id: Uuid) -> Result<PaymentRecord, AppError> {
        let synthetic_txn = format!("free-{record_id}");
        let record = self
            .repo
            .attach_transaction(record_id, synthetic_txn.clone())
            .await
            .map_err(|err| AppError::from_repo_as_domain(err, "payment"))?;
        debug_assert_eq!(record.amount_minor, 0);

        self.repo
            .complete_where_pending(&synthetic_txn)
            .await?
            .ok_or_else(|| {
                DomainError::state(format!("payment {record_id} is no longer pending")).into()
            })
    }

    /// Idempotent application of a provider outcome, keyed by transaction
    /// id. The pending→completed update is a single compare-and-set, so of
    /// N concurrent duplicate deliveries exactly one observes `Activate`.
    pub async fn apply_provider_event(
        &self,
        transaction_id: &str,
        outcome: ChargeOutcome,
    ) -> Result<LedgerSignal, AppError> {
        match outcome {
            ChargeOutcome::Succeeded => {
                if let Some(applied) = self.repo.complete_where_pending(transaction_id).await? {
                    info!(payment = %applied.id, transaction_id, "payment completed");
                    return Ok(LedgerSignal::Activate(applied));
                }

                let existing = self
                    .repo
                    .find_by_transaction(transaction_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("payment"))?;
                match existing.status {
                    PaymentStatus::Completed => {
                        info!(payment = %existing.id, transaction_id, "duplicate delivery ignored");
                        Ok(LedgerSignal::AlreadyApplied(existing))
                    }
                    status => Err(DomainError::state(format!(
                        "success reported for transaction `{transaction_id}` in state `{}`",
                        status.as_str()
                    ))
                    .into()),
                }
            }
            ChargeOutcome::Failed => {
                if let Some(failed) = self.repo.fail_where_pending(transaction_id).await? {
                    warn!(payment = %failed.id, transaction_id, "payment failed");
                    return Ok(LedgerSignal::Failed(failed));
                }

                let existing = self
                    .repo
                    .find_by_transaction(transaction_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("payment"))?;
                // A failure event after the record already settled is stale
                // provider noise; report the record as-is.
                Ok(LedgerSignal::Failed(existing))
            }
        }
    }

    /// Explicit refund action. Eligibility (completed, unrefunded, within
    /// the window) is checked against the current record, then the status
    /// flip is a completed→refunded compare-and-set.
    pub async fn refund(&self, record_id: Uuid, reason: String) -> Result<PaymentRecord, AppError> {
        let now = OffsetDateTime::now_utc();
        let record = self
            .repo
            .fetch(record_id)
            .await?
            .ok_or_else(|| DomainError::not_found("payment"))?;
        ensure_refundable(&record, now)?;

        // TODO: issue the provider-side refund call once the gateway grows
        // a refund endpoint; today only the ledger is updated.
        self.repo
            .refund_where_completed(record_id, reason, now)
            .await?
            .ok_or_else(|| {
                DomainError::state(format!("payment {record_id} was refunded concurrently")).into()
            })
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>, AppError> {
        Ok(self.repo.list_for_user(user_id).await?)
    }

    pub async fn fetch(&self, record_id: Uuid) -> Result<PaymentRecord, AppError> {
        self.repo
            .fetch(record_id)
            .await?
            .ok_or_else(|| DomainError::not_found("payment").into())
    }
}
