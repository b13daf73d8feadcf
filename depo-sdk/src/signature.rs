//! Signature algorithms and verification.
//!
//! Two independent schemes live here.
//!
//! * **Identity assertions** (User API). The identity gateway in front of the
//!   service vouches for the authenticated user id:
//!
//!   ```text
//!   Depo-User-Id:   {user_id}
//!   Depo-Signature: {unix_timestamp}.{base64_signature}
//!   ```
//!
//!   where the signature is `HMAC-SHA256("{user_id}.{timestamp}", identity_secret)`.
//!
//! * **Provider IPN** (webhook). The payment provider signs every callback:
//!
//!   ```text
//!   x-nowpayments-sig: {hex(HMAC-SHA512(sorted_json(body), ipn_secret))}
//!   ```
//!
//!   `sorted_json` is the body re-serialized with object keys sorted
//!   recursively and no insignificant whitespace.

use serde_json::{Map, Value};

/// Header name for the identity assertion signature.
pub const SIGNATURE_HEADER: &str = "Depo-Signature";

/// Header name carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "Depo-User-Id";

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Depo-Admin-Authorization";

/// Header name of the provider's IPN signature.
pub const IPN_SIGNATURE_HEADER: &str = "x-nowpayments-sig";

/// Maximum allowed age of an identity assertion (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

// ---------------------------------------------------------------------------
// Header parsing / formatting
// ---------------------------------------------------------------------------

/// Parse a `Depo-Signature` header value (`{timestamp}.{base64}`) into
/// `(timestamp, raw_signature_bytes)`.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let dot_pos = value.find('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = value[..dot_pos]
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature_bytes = fast32::base64::RFC4648_NOPAD
        .decode_str(&value[dot_pos + 1..])
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature_bytes))
}

/// Format a `{timestamp}.{base64}` header value from its parts.
pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Identity assertions (User API)
// ---------------------------------------------------------------------------

/// Sign a user id: `HMAC-SHA256("{user_id}.{timestamp}", key)`.
///
/// Returns the formatted `Depo-Signature` header value.
pub fn sign_user(user_id: &str, key: &[u8]) -> String {
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
    sign_user_at(user_id, timestamp, key)
}

/// Like [`sign_user`] with an explicit timestamp.
pub fn sign_user_at(user_id: &str, timestamp: i64, key: &[u8]) -> String {
    let data = format!("{user_id}.{timestamp}");
    let sig = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
    );
    format_signature_header(timestamp, sig.as_ref())
}

/// Verify an identity assertion.
///
/// Checks `HMAC-SHA256("{user_id}.{timestamp}", key)` and timestamp freshness.
pub fn verify_user(
    user_id: &str,
    timestamp: i64,
    signature: &[u8],
    key: &[u8],
) -> Result<(), SignatureError> {
    let data = format!("{user_id}.{timestamp}");
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
        signature,
    )?;
    check_timestamp(timestamp)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Provider IPN
// ---------------------------------------------------------------------------

/// Re-serialize a JSON document with object keys sorted recursively.
pub fn sorted_json(body: &str) -> Result<String, SignatureError> {
    let value: Value = serde_json::from_str(body)?;
    Ok(serde_json::to_string(&sort_keys(value))?)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Compute the hex `x-nowpayments-sig` value for a raw IPN body.
pub fn sign_ipn(body: &str, secret: &[u8]) -> Result<String, SignatureError> {
    let canonical = sorted_json(body)?;
    let sig = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA512, secret),
        canonical.as_bytes(),
    );
    Ok(hex::encode(sig.as_ref()))
}

/// Verify the `x-nowpayments-sig` header against a raw IPN body.
///
/// The comparison is constant-time.
pub fn verify_ipn(body: &str, signature_hex: &str, secret: &[u8]) -> Result<(), SignatureError> {
    let signature =
        hex::decode(signature_hex.trim()).map_err(|_| SignatureError::InvalidHex)?;
    let canonical = sorted_json(body)?;
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA512, secret),
        canonical.as_bytes(),
        &signature,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_assertion_roundtrip() {
        let header = sign_user("user-42", b"gateway-secret");
        let (ts, sig) = parse_signature_header(&header).unwrap();
        assert!(verify_user("user-42", ts, &sig, b"gateway-secret").is_ok());
        assert!(matches!(
            verify_user("user-43", ts, &sig, b"gateway-secret"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_stale_user_assertion_rejected() {
        let old = time::OffsetDateTime::now_utc().unix_timestamp() - MAX_SIGNATURE_AGE - 10;
        let header = sign_user_at("user-42", old, b"k");
        let (ts, sig) = parse_signature_header(&header).unwrap();
        assert!(matches!(
            verify_user("user-42", ts, &sig, b"k"),
            Err(SignatureError::Expired)
        ));
    }

    #[test]
    fn test_sorted_json_is_key_order_independent() {
        let a = r#"{"b":1,"a":{"d":2,"c":[{"z":1,"y":2}]}}"#;
        let b = r#"{ "a": {"c": [{"y": 2, "z": 1}], "d": 2}, "b": 1 }"#;
        assert_eq!(sorted_json(a).unwrap(), sorted_json(b).unwrap());
        assert_eq!(sorted_json(a).unwrap(), r#"{"a":{"c":[{"y":2,"z":1}],"d":2},"b":1}"#);
    }

    #[test]
    fn test_ipn_signature() {
        let body = r#"{"payment_status":"finished","payment_id":1,"order_id":"o"}"#;
        let sig = sign_ipn(body, b"ipn-secret").unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify_ipn(body, &sig, b"ipn-secret").is_ok());

        let reordered = r#"{"order_id":"o","payment_id":1,"payment_status":"finished"}"#;
        assert!(verify_ipn(reordered, &sig, b"ipn-secret").is_ok());

        let tampered = r#"{"payment_status":"finished","payment_id":2,"order_id":"o"}"#;
        assert!(matches!(
            verify_ipn(tampered, &sig, b"ipn-secret"),
            Err(SignatureError::SignatureMismatch)
        ));
        assert!(matches!(
            verify_ipn(body, "not-hex", b"ipn-secret"),
            Err(SignatureError::InvalidHex)
        ));
    }
}
