//! Provider callback authentication and envelope parsing.
//!
//! Verification is a pure function over the raw payload bytes and runs
//! before any business field is deserialized: a payload that does not carry
//! a valid signature never reaches state-mutating code.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::application::collaborators::ChargeMetadata;
use crate::domain::types::ListingTier;

type HmacSha256 = Hmac<Sha256>;

/// Signature header shape: `t=<unix-seconds>,v1=<hex hmac-sha256>`.
/// The signed message is `"{t}.{raw_body}"`, which binds the timestamp to
/// the payload. Multiple `v1` entries are accepted (secret rotation).
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some((timestamp, candidates)) = parse_signature_header(signature_header) else {
        return false;
    };
    if candidates.is_empty() {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    candidates.iter().any(|candidate| {
        hex::decode(candidate)
            .is_ok_and(|decoded| decoded.ct_eq(expected.as_slice()).into())
    })
}

fn parse_signature_header(header: &str) -> Option<(String, Vec<String>)> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = Some(value.to_string()),
            "v1" => candidates.push(value.to_string()),
            // Unknown schemes are ignored, not rejected.
            _ => {}
        }
    }

    Some((timestamp?, candidates))
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed event payload: {0}")]
    Malformed(String),
    #[error("event is missing correlation metadata field `{0}`")]
    MissingMetadata(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded,
    Failed,
}

/// Business fields extracted from a verified provider event.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub event_id: String,
    pub transaction_id: String,
    pub outcome: ChargeOutcome,
    pub metadata: ChargeMetadata,
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: EnvelopeObject,
}

#[derive(Deserialize)]
struct EnvelopeObject {
    id: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Parse a verified payload. `Ok(None)` means the event type is one we do
/// not act on; the provider still expects an acknowledgement for those.
pub fn parse_event(payload: &[u8]) -> Result<Option<ProviderEvent>, EventParseError> {
    let envelope: Envelope = serde_json::from_slice(payload)
        .map_err(|err| EventParseError::Malformed(err.to_string()))?;

    let outcome = match envelope.event_type.as_str() {
        "payment_intent.succeeded" => ChargeOutcome::Succeeded,
        "payment_intent.payment_failed" => ChargeOutcome::Failed,
        _ => return Ok(None),
    };

    let metadata = &envelope.data.object.metadata;
    let listing_id = metadata_uuid(metadata, "listing_id")?;
    let user_id = metadata_uuid(metadata, "user_id")?;
    let tier = match metadata_str(metadata, "tier")? {
        "free" => ListingTier::Free,
        "premium" => ListingTier::Premium,
        "featured" => ListingTier::Featured,
        other => {
            return Err(EventParseError::Malformed(format!(
                "unknown tier `{other}` in metadata"
            )));
        }
    };

    Ok(Some(ProviderEvent {
        event_id: envelope.id,
        transaction_id: envelope.data.object.id,
        outcome,
        metadata: ChargeMetadata {
            listing_id,
            user_id,
            tier,
        },
    }))
}

fn metadata_str<'a>(
    metadata: &'a serde_json::Map<String, serde_json::Value>,
    key: &'static str,
) -> Result<&'a str, EventParseError> {
    metadata
        .get(key)
        .and_then(|value| value.as_str())
        .ok_or(EventParseError::MissingMetadata(key))
}

fn metadata_uuid(
    metadata: &serde_json::Map<String, serde_json::Value>,
    key: &'static str,
) -> Result<Uuid, EventParseError> {
    metadata_str(metadata, key)?
        .parse()
        .map_err(|_| EventParseError::Malformed(format!("metadata field `{key}` is not a uuid")))
}
