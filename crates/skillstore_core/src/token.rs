//! crates/skillstore_core/src/token.rs
//!
//! The signed download-token codec: compact, tamper-evident, expiring tokens
//! that grant file access without any server-side token storage.
//!
//! A token is `base64url(json-payload) . base64url(hmac-sha256(payload-part))`.
//! Both halves use the unpadded URL-safe alphabet, which cannot contain the
//! `.` delimiter.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::domain::FileKind;

type HmacSha256 = Hmac<Sha256>;

/// The payload carried by a signed download link.
///
/// Ephemeral by design: regenerated on demand, never persisted, and only
/// invalidated by `expires_at` (the order's status is re-checked at download
/// time regardless).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadToken {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub file_kind: FileKind,
    /// Unix timestamp (seconds) after which the token is rejected.
    pub expires_at: i64,
}

impl DownloadToken {
    pub fn new(
        order_id: Uuid,
        product_id: Uuid,
        file_kind: FileKind,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            product_id,
            file_kind,
            expires_at: expires_at.timestamp(),
        }
    }
}

/// The single error surfaced by [`decode`]. Malformed input, a bad signature,
/// an unparsable payload, and expiry all collapse to this so responses cannot
/// leak which check failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid or expired download token")]
pub struct InvalidToken;

/// Serializes and signs a token with the server secret.
pub fn encode(token: &DownloadToken, secret: &[u8]) -> String {
    // Serialization of our own payload type cannot fail.
    let payload = serde_json::to_vec(token).expect("download token serializes");
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signature = sign(payload_b64.as_bytes(), secret);
    format!("{}.{}", payload_b64, URL_SAFE_NO_PAD.encode(signature))
}

/// Verifies and deserializes a token against the current clock.
pub fn decode(token: &str, secret: &[u8]) -> Result<DownloadToken, InvalidToken> {
    decode_at(token, secret, Utc::now())
}

/// Verifies and deserializes a token against an explicit clock.
pub fn decode_at(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<DownloadToken, InvalidToken> {
    let mut parts = token.split('.');
    let (payload_b64, signature_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(p), Some(s), None) if !p.is_empty() && !s.is_empty() => (p, s),
        _ => return Err(InvalidToken),
    };

    let provided = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| InvalidToken)?;
    let expected = sign(payload_b64.as_bytes(), secret);
    if !bool::from(expected.ct_eq(&provided)) {
        return Err(InvalidToken);
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| InvalidToken)?;
    let payload: DownloadToken =
        serde_json::from_slice(&payload_bytes).map_err(|_| InvalidToken)?;

    if now.timestamp() > payload.expires_at {
        return Err(InvalidToken);
    }

    Ok(payload)
}

fn sign(data: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-download-secret";

    fn sample_token(expires_at: DateTime<Utc>) -> DownloadToken {
        DownloadToken::new(Uuid::new_v4(), Uuid::new_v4(), FileKind::Skill, expires_at)
    }

    #[test]
    fn round_trips_before_expiry() {
        let token = sample_token(Utc::now() + Duration::days(7));
        let encoded = encode(&token, SECRET);
        let decoded = decode(&encoded, SECRET).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sample_token(Utc::now() + Duration::days(7));
        let encoded = encode(&token, SECRET);
        assert_eq!(decode(&encoded, b"other-secret"), Err(InvalidToken));
    }

    #[test]
    fn rejects_tampered_signature() {
        let token = sample_token(Utc::now() + Duration::days(7));
        let encoded = encode(&token, SECRET);
        let (payload, signature) = encoded.split_once('.').unwrap();

        // Flip every character of the signature portion in turn.
        for i in 0..signature.len() {
            let mut bytes = signature.as_bytes().to_vec();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = format!("{}.{}", payload, String::from_utf8(bytes).unwrap());
            assert_eq!(decode(&tampered, SECRET), Err(InvalidToken), "index {}", i);
        }
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = sample_token(Utc::now() + Duration::days(7));
        let encoded = encode(&token, SECRET);
        let (payload, signature) = encoded.split_once('.').unwrap();

        let other = sample_token(Utc::now() + Duration::days(30));
        let other_payload = encode(&other, SECRET);
        let (other_payload, _) = other_payload.split_once('.').unwrap();
        assert_ne!(payload, other_payload);

        let swapped = format!("{}.{}", other_payload, signature);
        assert_eq!(decode(&swapped, SECRET), Err(InvalidToken));
    }

    #[test]
    fn rejects_expired_token_with_valid_signature() {
        let token = sample_token(Utc::now() - Duration::seconds(1));
        let encoded = encode(&token, SECRET);
        assert_eq!(decode(&encoded, SECRET), Err(InvalidToken));
    }

    #[test]
    fn expiry_is_evaluated_against_the_given_clock() {
        let issued = Utc::now();
        let token = sample_token(issued + Duration::days(7));
        let encoded = encode(&token, SECRET);

        assert!(decode_at(&encoded, SECRET, issued).is_ok());
        let after = issued + Duration::days(7) + Duration::seconds(1);
        assert_eq!(decode_at(&encoded, SECRET, after), Err(InvalidToken));
    }

    #[test]
    fn rejects_wrong_arity() {
        for bad in ["", "just-one-part", "a.b.c", ".signature", "payload."] {
            assert_eq!(decode(bad, SECRET), Err(InvalidToken), "{:?}", bad);
        }
    }

    #[test]
    fn rejects_unparsable_payload() {
        let garbage = URL_SAFE_NO_PAD.encode(b"not json");
        let signature = URL_SAFE_NO_PAD.encode(sign(garbage.as_bytes(), SECRET));
        let token = format!("{}.{}", garbage, signature);
        assert_eq!(decode(&token, SECRET), Err(InvalidToken));
    }
}
