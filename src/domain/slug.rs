//! Slug derivation for listings and categories.
//!
//! Listing slugs carry a millisecond-timestamp suffix so that two listings
//! with the same title almost never collide. The suffix is a convenience,
//! not a guarantee: persistence keeps a unique index on the slug column and
//! callers retry with a fresh suffix when the insert reports a duplicate.

use slug::slugify;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

const RETRY_NONCE_LEN: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a plain slug from human-readable text. Used for category slugs,
/// which must be stable and carry no suffix.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Listing slug: `slugify(title)` plus the creation instant in unix millis.
/// Computed once at creation and never recomputed on later edits.
pub fn timestamped_slug(title: &str, at: OffsetDateTime) -> Result<String, SlugError> {
    let base = derive_slug(title)?;
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    Ok(format!("{base}-{millis}"))
}

/// Retry variant of [`timestamped_slug`]. An in-process retry lands in the
/// same millisecond as the collision it is resolving, so the timestamp alone
/// would reproduce the identical slug; a short random fragment breaks the
/// tie.
pub fn retried_slug(title: &str, at: OffsetDateTime) -> Result<String, SlugError> {
    let base = timestamped_slug(title, at)?;
    let nonce = Uuid::new_v4().simple().to_string();
    Ok(format!("{base}-{}", &nonce[..RETRY_NONCE_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn derive_slug_normalizes() {
        assert_eq!(derive_slug("1987 Catalina 30!").expect("slug"), "1987-catalina-30");
    }

    #[test]
    fn empty_and_unrepresentable_inputs_fail() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn timestamped_slug_appends_millis() {
        let at = datetime!(2026-03-01 00:00:00 UTC);
        let slug = timestamped_slug("Boston Whaler", at).expect("slug");
        let millis = at.unix_timestamp() * 1_000;
        assert_eq!(slug, format!("boston-whaler-{millis}"));
    }

    #[test]
    fn retried_slug_varies_at_a_fixed_instant() {
        let at = datetime!(2026-03-01 00:00:00 UTC);
        let prefix = timestamped_slug("Boston Whaler", at).expect("slug");

        let first = retried_slug("Boston Whaler", at).expect("slug");
        let second = retried_slug("Boston Whaler", at).expect("slug");
        assert!(first.starts_with(&prefix));
        assert!(second.starts_with(&prefix));
        assert_ne!(first, second);
    }
}
