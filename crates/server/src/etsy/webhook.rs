//! Verification of signed Etsy webhook deliveries.
//!
//! Etsy signs webhooks following the Standard Webhooks scheme:
//! `webhook-signature` holds space-separated `v1,<base64>` entries, each an
//! HMAC-SHA256 over `{webhook-id}.{webhook-timestamp}.{body}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

/// Maximum allowed distance between the delivery timestamp and now.
pub const TOLERANCE_SECS: i64 = 300;

pub const HEADER_ID: &str = "webhook-id";
pub const HEADER_TIMESTAMP: &str = "webhook-timestamp";
pub const HEADER_SIGNATURE: &str = "webhook-signature";

const SECRET_PREFIX: &str = "whsec_";

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook delivery is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("invalid signing key")]
    InvalidKey,
}

/// Headers carried by a webhook delivery.
#[derive(Debug, Clone, Copy)]
pub struct WebhookHeaders<'a> {
    pub id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

impl<'a> WebhookHeaders<'a> {
    /// Read the signature headers from a request.
    #[must_use]
    pub fn from_header_map(headers: &'a axum::http::HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            id: get(HEADER_ID),
            timestamp: get(HEADER_TIMESTAMP),
            signature: get(HEADER_SIGNATURE),
        }
    }
}

/// Signing key bytes. `whsec_`-prefixed secrets are base64 encoded.
fn key_bytes(secret: &SecretString) -> Vec<u8> {
    let raw = secret.expose_secret();
    raw.strip_prefix(SECRET_PREFIX)
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .unwrap_or_else(|| raw.as_bytes().to_vec())
}

fn mac_for(
    secret: &SecretString,
    id: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<HmacSha256, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(&key_bytes(secret)).map_err(|_| WebhookError::InvalidKey)?;
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Produce a `v1,<base64>` signature for a payload.
///
/// # Errors
///
/// Returns `WebhookError::InvalidKey` if the secret cannot key an HMAC.
pub fn sign(
    secret: &SecretString,
    id: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, WebhookError> {
    let mac = mac_for(secret, id, &timestamp.to_string(), body)?;
    Ok(format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())))
}

/// Verify a delivery against the shared secret.
///
/// # Errors
///
/// Returns a [`WebhookError`] naming the first check that failed.
pub fn verify(
    secret: &SecretString,
    headers: WebhookHeaders<'_>,
    body: &[u8],
    now: i64,
) -> Result<(), WebhookError> {
    let id = headers.id.ok_or(WebhookError::MissingHeader(HEADER_ID))?;
    let timestamp = headers
        .timestamp
        .ok_or(WebhookError::MissingHeader(HEADER_TIMESTAMP))?;
    let signature = headers
        .signature
        .ok_or(WebhookError::MissingHeader(HEADER_SIGNATURE))?;

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| WebhookError::InvalidTimestamp)?;
    if now.abs_diff(ts) > TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookError::StaleTimestamp);
    }

    let expected = mac_for(secret, id, timestamp.trim(), body)?;

    let matched = signature
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .filter_map(|encoded| STANDARD.decode(encoded).ok())
        // verify_slice compares in constant time
        .any(|candidate| expected.clone().verify_slice(&candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event_name":"order.paid","resource_url":"https://openapi.etsy.com/v3/application/shops/1/receipts/2"}"#;

    fn secret() -> SecretString {
        SecretString::from("whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw")
    }

    fn headers<'a>(id: &'a str, ts: &'a str, sig: &'a str) -> WebhookHeaders<'a> {
        WebhookHeaders {
            id: Some(id),
            timestamp: Some(ts),
            signature: Some(sig),
        }
    }

    #[test]
    fn test_valid_signature_accepted() {
        let now = 1_700_000_000;
        let sig = sign(&secret(), "msg_1", now, BODY).unwrap();
        let ts = now.to_string();
        assert_eq!(verify(&secret(), headers("msg_1", &ts, &sig), BODY, now), Ok(()));
    }

    #[test]
    fn test_any_listed_signature_accepted() {
        let now = 1_700_000_000;
        let good = sign(&secret(), "msg_1", now, BODY).unwrap();
        let list = format!("v1,bm90LXRoZS1zaWc= {good}");
        let ts = now.to_string();
        assert!(verify(&secret(), headers("msg_1", &ts, &list), BODY, now).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = 1_700_000_000;
        let sig = sign(&secret(), "msg_1", now, BODY).unwrap();
        let ts = now.to_string();
        assert_eq!(
            verify(&secret(), headers("msg_1", &ts, &sig), b"{}", now),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_id_rejected() {
        let now = 1_700_000_000;
        let sig = sign(&secret(), "msg_1", now, BODY).unwrap();
        let ts = now.to_string();
        assert_eq!(
            verify(&secret(), headers("msg_2", &ts, &sig), BODY, now),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let sent = 1_700_000_000;
        let sig = sign(&secret(), "msg_1", sent, BODY).unwrap();
        let ts = sent.to_string();
        assert_eq!(
            verify(&secret(), headers("msg_1", &ts, &sig), BODY, sent + 301),
            Err(WebhookError::StaleTimestamp)
        );
        assert!(verify(&secret(), headers("msg_1", &ts, &sig), BODY, sent + 299).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_rejected_as_stale() {
        let now = 1_700_000_000;
        for ts in [i64::MIN.to_string(), i64::MAX.to_string()] {
            assert_eq!(
                verify(&secret(), headers("msg_1", &ts, "v1,AAAA"), b"{}", now),
                Err(WebhookError::StaleTimestamp)
            );
        }
    }

    #[test]
    fn test_missing_headers_rejected() {
        let empty = WebhookHeaders {
            id: None,
            timestamp: None,
            signature: None,
        };
        assert_eq!(
            verify(&secret(), empty, BODY, 0),
            Err(WebhookError::MissingHeader(HEADER_ID))
        );
    }

    #[test]
    fn test_plain_secret_supported() {
        let plain = SecretString::from("not-base64-prefixed");
        let now = 1_700_000_000;
        let sig = sign(&plain, "msg_1", now, BODY).unwrap();
        let ts = now.to_string();
        assert!(verify(&plain, headers("msg_1", &ts, &sig), BODY, now).is_ok());
    }
}
