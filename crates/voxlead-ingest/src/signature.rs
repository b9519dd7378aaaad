//! Webhook signature verification.
//!
//! The voice provider signs each notification with HMAC-SHA256 over
//! `"{timestamp}.{raw_body}"` and sends the result in a header shaped
//! `t=<unix-seconds>,v0=<hex-hmac>`. Verification enforces a replay window
//! around the timestamp and compares digests in constant time.
//!
//! Verification never panics and never returns an error: every failure
//! branch produces a [`VerifyResult`] carrying a structured reason that is
//! used for logging only.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::SIGNATURE_TOLERANCE_SECS;

type HmacSha256 = Hmac<Sha256>;

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    /// Whether the notification should be accepted.
    pub is_valid: bool,
    /// True when no secret is configured and verification was skipped.
    pub skipped: bool,
    /// Failure reason when `is_valid` is false.
    pub failure: Option<SignatureFailure>,
}

impl VerifyResult {
    /// Creates a successful verification result.
    pub fn valid() -> Self {
        Self { is_valid: true, skipped: false, failure: None }
    }

    /// Creates a result for the no-secret permissive mode.
    pub fn skipped() -> Self {
        Self { is_valid: true, skipped: true, failure: None }
    }

    /// Creates a failed verification result.
    pub fn invalid(failure: SignatureFailure) -> Self {
        Self { is_valid: false, skipped: false, failure: Some(failure) }
    }
}

/// Structured reasons for signature verification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// Signature header absent from the request.
    MissingHeader,
    /// Header did not split into `t=...,v0=...`.
    MalformedHeader(String),
    /// Timestamp part was not a valid integer.
    InvalidTimestamp(String),
    /// Timestamp outside the replay window.
    TimestampOutsideWindow {
        /// Seconds between the header timestamp and now (signed).
        skew_seconds: i64,
    },
    /// Secret could not be used as an HMAC key.
    InvalidSecret,
    /// Computed digest did not match the provided one.
    DigestMismatch,
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "signature header missing"),
            Self::MalformedHeader(detail) => write!(f, "malformed signature header: {detail}"),
            Self::InvalidTimestamp(raw) => write!(f, "invalid signature timestamp: {raw}"),
            Self::TimestampOutsideWindow { skew_seconds } => {
                write!(f, "timestamp outside replay window: skew {skew_seconds}s")
            },
            Self::InvalidSecret => write!(f, "invalid secret key"),
            Self::DigestMismatch => write!(f, "signature mismatch"),
        }
    }
}

/// Verifies a webhook signature header against the raw request body.
///
/// When `secret` is `None` verification is skipped and the notification is
/// accepted. This is an explicit insecure development mode and is logged
/// loudly every time it is taken.
///
/// The header must be exactly `t=<unix-seconds>,v0=<hex-hmac>`. The signed
/// string is `"{timestamp}.{raw_body}"`, HMAC-SHA256 under the shared
/// secret, hex-encoded. Timestamps more than [`SIGNATURE_TOLERANCE_SECS`]
/// away from `now_unix` in either direction are rejected.
pub fn verify_signature(
    payload: &[u8],
    signature_header: Option<&str>,
    secret: Option<&str>,
    now_unix: i64,
) -> VerifyResult {
    let Some(secret) = secret else {
        warn!("webhook secret not configured, skipping signature verification (insecure mode)");
        return VerifyResult::skipped();
    };

    let Some(header) = signature_header else {
        return VerifyResult::invalid(SignatureFailure::MissingHeader);
    };

    let (timestamp_raw, provided_hex) = match parse_signature_header(header) {
        Ok(parts) => parts,
        Err(failure) => return VerifyResult::invalid(failure),
    };

    let timestamp: i64 = match timestamp_raw.parse() {
        Ok(t) => t,
        Err(_) => {
            return VerifyResult::invalid(SignatureFailure::InvalidTimestamp(
                timestamp_raw.to_string(),
            ))
        },
    };

    let skew_seconds = now_unix - timestamp;
    if skew_seconds.abs() > SIGNATURE_TOLERANCE_SECS {
        return VerifyResult::invalid(SignatureFailure::TimestampOutsideWindow { skew_seconds });
    }

    let expected_hex = match signed_payload_hmac_hex(payload, timestamp_raw, secret) {
        Ok(hex) => hex,
        Err(failure) => return VerifyResult::invalid(failure),
    };

    if timing_safe_eq(&provided_hex.to_ascii_lowercase(), &expected_hex) {
        VerifyResult::valid()
    } else {
        VerifyResult::invalid(SignatureFailure::DigestMismatch)
    }
}

/// Computes the expected HMAC-SHA256 hex digest for a signed payload.
///
/// The canonical signed string is the timestamp, a literal dot, then the
/// raw body bytes.
///
/// # Errors
///
/// Returns `SignatureFailure::InvalidSecret` if the secret cannot key the
/// MAC.
pub fn signed_payload_hmac_hex(
    payload: &[u8],
    timestamp: &str,
    secret: &str,
) -> std::result::Result<String, SignatureFailure> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureFailure::InvalidSecret)?;

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Splits a `t=...,v0=...` header into its two parts.
fn parse_signature_header(header: &str) -> std::result::Result<(&str, &str), SignatureFailure> {
    let parts: Vec<&str> = header.split(',').collect();
    if parts.len() != 2 {
        return Err(SignatureFailure::MalformedHeader(format!(
            "expected 2 comma-separated parts, got {}",
            parts.len()
        )));
    }

    let timestamp = parts[0]
        .strip_prefix("t=")
        .ok_or_else(|| SignatureFailure::MalformedHeader("missing t= prefix".to_string()))?;
    let digest = parts[1]
        .strip_prefix("v0=")
        .ok_or_else(|| SignatureFailure::MalformedHeader("missing v0= prefix".to_string()))?;

    Ok((timestamp, digest))
}

/// Timing-safe string comparison to prevent timing attacks.
///
/// Uses constant-time comparison to avoid leaking information about the
/// expected digest through timing analysis. Length mismatch returns false
/// immediately.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.as_bytes().iter().zip(b.as_bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "wh_secret_test";
    const NOW: i64 = 1_750_000_000;

    fn signed_header(payload: &[u8], timestamp: i64, secret: &str) -> String {
        let digest =
            signed_payload_hmac_hex(payload, &timestamp.to_string(), secret).expect("hmac");
        format!("t={timestamp},v0={digest}")
    }

    #[test]
    fn valid_signature_accepted() {
        let payload = br#"{"conversation_id":"conv_001"}"#;
        let header = signed_header(payload, NOW, SECRET);

        let result = verify_signature(payload, Some(&header), Some(SECRET), NOW);
        assert!(result.is_valid);
        assert!(!result.skipped);
    }

    #[test]
    fn no_secret_skips_verification() {
        let result = verify_signature(b"anything", Some("t=1,v0=junk"), None, NOW);
        assert!(result.is_valid);
        assert!(result.skipped);
    }

    #[test]
    fn missing_header_rejected() {
        let result = verify_signature(b"payload", None, Some(SECRET), NOW);
        assert_eq!(result.failure, Some(SignatureFailure::MissingHeader));
    }

    #[test]
    fn missing_v0_prefix_rejected() {
        let result = verify_signature(b"payload", Some("t=123,sig=abc"), Some(SECRET), NOW);
        assert!(!result.is_valid);
        assert!(matches!(result.failure, Some(SignatureFailure::MalformedHeader(_))));
    }

    #[test]
    fn wrong_part_count_rejected() {
        let result = verify_signature(b"payload", Some("t=123"), Some(SECRET), NOW);
        assert!(matches!(result.failure, Some(SignatureFailure::MalformedHeader(_))));

        let result =
            verify_signature(b"payload", Some("t=123,v0=ab,v1=cd"), Some(SECRET), NOW);
        assert!(matches!(result.failure, Some(SignatureFailure::MalformedHeader(_))));
    }

    #[test]
    fn digest_mismatch_rejected() {
        let payload = b"payload";
        let header = signed_header(payload, NOW, "a different secret");

        let result = verify_signature(payload, Some(&header), Some(SECRET), NOW);
        assert_eq!(result.failure, Some(SignatureFailure::DigestMismatch));
    }

    #[test]
    fn tampered_body_rejected() {
        let header = signed_header(b"original body", NOW, SECRET);

        let result = verify_signature(b"tampered body", Some(&header), Some(SECRET), NOW);
        assert_eq!(result.failure, Some(SignatureFailure::DigestMismatch));
    }

    #[test]
    fn replay_window_boundary() {
        let payload = b"payload";

        // 300 seconds old is still inside the window.
        let header = signed_header(payload, NOW - 300, SECRET);
        assert!(verify_signature(payload, Some(&header), Some(SECRET), NOW).is_valid);

        // 301 seconds old is rejected.
        let header = signed_header(payload, NOW - 301, SECRET);
        let result = verify_signature(payload, Some(&header), Some(SECRET), NOW);
        assert_eq!(
            result.failure,
            Some(SignatureFailure::TimestampOutsideWindow { skew_seconds: 301 })
        );

        // Timestamps from the future fail the same way.
        let header = signed_header(payload, NOW + 301, SECRET);
        let result = verify_signature(payload, Some(&header), Some(SECRET), NOW);
        assert!(!result.is_valid);
    }

    #[test]
    fn non_numeric_timestamp_rejected() {
        let result =
            verify_signature(b"payload", Some("t=soon,v0=abcdef"), Some(SECRET), NOW);
        assert!(matches!(result.failure, Some(SignatureFailure::InvalidTimestamp(_))));
    }

    #[test]
    fn length_mismatch_is_false_not_crash() {
        let result = verify_signature(b"payload", Some("t=1750000000,v0=ab"), Some(SECRET), NOW);
        assert!(!result.is_valid);
    }

    #[test]
    fn uppercase_digest_accepted() {
        let payload = b"payload";
        let digest =
            signed_payload_hmac_hex(payload, &NOW.to_string(), SECRET).expect("hmac");
        let header = format!("t={NOW},v0={}", digest.to_ascii_uppercase());

        assert!(verify_signature(payload, Some(&header), Some(SECRET), NOW).is_valid);
    }
}
