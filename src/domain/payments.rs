//! Payment ledger invariants: tier pricing, status monotonicity, and the
//! refund eligibility window.

use time::{Duration, OffsetDateTime};

use crate::domain::entities::PaymentRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{ListingTier, PaymentStatus};

/// Refunds are only honoured for thirty days after the charge was opened.
pub const REFUND_WINDOW: Duration = Duration::days(30);

/// Promotion price per tier, in minor currency units.
pub fn tier_amount_minor(tier: ListingTier) -> i64 {
    match tier {
        ListingTier::Free => 0,
        ListingTier::Premium => 1_000,
        ListingTier::Featured => 3_000,
    }
}

/// Whether `from → to` respects the one-directional ledger state machine.
/// The only edge out of a settled state is `completed → refunded`.
pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
    )
}

/// Refund eligibility: completed, never refunded, and inside the window.
pub fn can_be_refunded(record: &PaymentRecord, now: OffsetDateTime) -> bool {
    record.status == PaymentStatus::Completed
        && record.refunded_at.is_none()
        && now - record.created_at < REFUND_WINDOW
}

pub fn ensure_refundable(record: &PaymentRecord, now: OffsetDateTime) -> Result<(), DomainError> {
    if can_be_refunded(record, now) {
        return Ok(());
    }
    Err(DomainError::state(format!(
        "payment {} is not refundable (status `{}`, opened {})",
        record.id,
        record.status.as_str(),
        record.created_at
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;
    use uuid::Uuid;

    use crate::domain::types::PaymentProviderKind;

    fn record(status: PaymentStatus, created_at: OffsetDateTime) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            amount_minor: 1_000,
            status,
            provider: PaymentProviderKind::Stripe,
            transaction_id: Some("pi_test".to_string()),
            user_id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            metadata: json!({}),
            refund_reason: None,
            refunded_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn tier_table_matches_pricing() {
        assert_eq!(tier_amount_minor(ListingTier::Free), 0);
        assert_eq!(tier_amount_minor(ListingTier::Premium), 1_000);
        assert_eq!(tier_amount_minor(ListingTier::Featured), 3_000);
    }

    #[test]
    fn transitions_are_one_directional() {
        use PaymentStatus::*;
        assert!(can_transition(Pending, Completed));
        assert!(can_transition(Pending, Failed));
        assert!(can_transition(Completed, Refunded));
        assert!(!can_transition(Completed, Pending));
        assert!(!can_transition(Failed, Completed));
        assert!(!can_transition(Refunded, Completed));
        assert!(!can_transition(Failed, Refunded));
    }

    #[test]
    fn refund_allowed_inside_window() {
        let opened = datetime!(2026-01-01 12:00 UTC);
        let rec = record(PaymentStatus::Completed, opened);
        assert!(can_be_refunded(&rec, opened + Duration::days(29)));
        assert!(!can_be_refunded(&rec, opened + Duration::days(30)));
        assert!(!can_be_refunded(&rec, opened + Duration::days(31)));
    }

    #[test]
    fn refund_requires_completed_and_unrefunded() {
        let opened = datetime!(2026-01-01 12:00 UTC);
        let now = opened + Duration::days(1);
        assert!(!can_be_refunded(&record(PaymentStatus::Pending, opened), now));
        assert!(!can_be_refunded(&record(PaymentStatus::Failed, opened), now));

        let mut already = record(PaymentStatus::Completed, opened);
        already.refunded_at = Some(now);
        assert!(!can_be_refunded(&already, now));

        let err = ensure_refundable(&already, now).expect_err("already refunded");
        assert!(matches!(err, DomainError::State { .. }));
    }
}
