//! Listing lifecycle rules.
//!
//! The transition table is the single authority for status changes; every
//! write path (promotion, moderation, expiry, sale) routes through it.

use crate::domain::error::DomainError;
use crate::domain::types::ListingStatus;

/// Whether `from → to` is a legal lifecycle transition.
///
/// Draft and pending listings may activate directly (promotion completes
/// either synchronously for the free tier or via the provider callback),
/// moderation rejection pushes a pending or active listing back to draft,
/// and active listings terminate as sold or expired.
pub fn can_transition(from: ListingStatus, to: ListingStatus) -> bool {
    use ListingStatus::*;
    matches!(
        (from, to),
        (Draft, Pending)
            | (Draft, Active)
            | (Pending, Active)
            | (Pending, Draft)
            | (Active, Draft)
            | (Active, Sold)
            | (Active, Expired)
    )
}

/// Source states from which `to` may be reached. Used by compare-and-set
/// status updates so that concurrent writers cannot race past the table.
pub fn allowed_sources(to: ListingStatus) -> &'static [ListingStatus] {
    use ListingStatus::*;
    match to {
        Draft => &[Pending, Active],
        Pending => &[Draft],
        Active => &[Draft, Pending],
        Sold => &[Active],
        Expired => &[Active],
    }
}

pub fn ensure_transition(from: ListingStatus, to: ListingStatus) -> Result<(), DomainError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(DomainError::state(format!(
            "listing cannot move from `{}` to `{}`",
            from.as_str(),
            to.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ListingStatus::*;

    #[test]
    fn promotion_activates_from_draft_and_pending() {
        assert!(can_transition(Draft, Active));
        assert!(can_transition(Pending, Active));
    }

    #[test]
    fn moderation_rejection_returns_to_draft() {
        assert!(can_transition(Pending, Draft));
        assert!(can_transition(Active, Draft));
        assert!(!can_transition(Active, Pending));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for to in [Draft, Pending, Active, Sold, Expired] {
            assert!(!can_transition(Sold, to), "sold -> {}", to.as_str());
            assert!(!can_transition(Expired, to), "expired -> {}", to.as_str());
        }
    }

    #[test]
    fn allowed_sources_agrees_with_table() {
        for from in [Draft, Pending, Active, Sold, Expired] {
            for to in [Draft, Pending, Active, Sold, Expired] {
                assert_eq!(
                    allowed_sources(to).contains(&from),
                    can_transition(from, to),
                    "{} -> {}",
                    from.as_str(),
                    to.as_str()
                );
            }
        }
    }

    #[test]
    fn ensure_transition_reports_state_error() {
        let err = ensure_transition(Sold, Active).expect_err("terminal");
        assert!(matches!(
            err,
            crate::domain::error::DomainError::State { .. }
        ));
    }
}
