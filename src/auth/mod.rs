//! Webhook signature verification
//!
//! Every inbound webhook carries two headers:
//! - `X-Kiket-Signature`: lowercase hex HMAC-SHA256 of `"{timestamp}.{body}"`
//! - `X-Kiket-Timestamp`: Unix seconds at which the platform signed the request
//!
//! Verification only applies to paths containing [`WEBHOOK_PATH_MARKER`];
//! everything else passes through untouched.

use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded HMAC digest.
pub const SIGNATURE_HEADER: &str = "x-kiket-signature";

/// Header carrying the signing timestamp (Unix seconds).
pub const TIMESTAMP_HEADER: &str = "x-kiket-timestamp";

/// Path segment that marks a request as a signed webhook.
pub const WEBHOOK_PATH_MARKER: &str = "/webhooks/";

/// Maximum allowed clock skew between platform and extension (5 minutes).
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Result of checking one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    MissingHeaders,
    InvalidTimestamp,
    Expired,
    SignatureMismatch,
    InternalError,
}

impl VerificationOutcome {
    pub fn is_valid(self) -> bool {
        self == VerificationOutcome::Valid
    }

    /// Convert into a `Result`, keeping the failure reason.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            VerificationOutcome::Valid => Ok(()),
            VerificationOutcome::MissingHeaders => Err(AuthError::MissingHeaders),
            VerificationOutcome::InvalidTimestamp => Err(AuthError::InvalidTimestamp),
            VerificationOutcome::Expired => Err(AuthError::Expired),
            VerificationOutcome::SignatureMismatch => Err(AuthError::SignatureMismatch),
            VerificationOutcome::InternalError => Err(AuthError::InternalError),
        }
    }
}

/// Reasons a webhook request is rejected before dispatch.
///
/// The display strings are the exact `error` messages returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing signature headers")]
    MissingHeaders,
    #[error("Invalid timestamp")]
    InvalidTimestamp,
    #[error("Request timestamp too old")]
    Expired,
    #[error("Invalid signature")]
    SignatureMismatch,
    #[error("Signature verification failed")]
    InternalError,
}

impl AuthError {
    /// HTTP status returned for this failure.
    pub fn status_code(self) -> StatusCode {
        match self {
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Whether a request path is subject to signature verification.
pub fn requires_signature(path: &str) -> bool {
    path.contains(WEBHOOK_PATH_MARKER)
}

/// Timing-safe string equality.
///
/// Length is not secret (a signature is always 64 hex characters), so a
/// length mismatch returns early; equal-length inputs are compared in
/// constant time.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Compute the lowercase hex signature for a timestamp and body.
///
/// Returns `None` when no usable secret is configured.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signed webhook against an explicit clock.
pub fn verify_signature_at(
    secret: Option<&str>,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
    now: i64,
) -> VerificationOutcome {
    let (signature, timestamp) = match (signature, timestamp) {
        (Some(sig), Some(ts)) => (sig, ts),
        _ => return VerificationOutcome::MissingHeaders,
    };

    let request_time = match timestamp.parse::<i64>() {
        Ok(ts) => ts,
        Err(_) => return VerificationOutcome::InvalidTimestamp,
    };

    if now.abs_diff(request_time) > SIGNATURE_TOLERANCE_SECS as u64 {
        debug!(target: "auth", now, request_time, "webhook timestamp outside tolerance");
        return VerificationOutcome::Expired;
    }

    let expected = match secret.and_then(|s| compute_signature(s, timestamp, body)) {
        Some(sig) => sig,
        None => return VerificationOutcome::InternalError,
    };

    if timing_safe_eq(signature, &expected) {
        VerificationOutcome::Valid
    } else {
        VerificationOutcome::SignatureMismatch
    }
}

/// Verify a signed webhook against the system clock.
pub fn verify_signature(
    secret: Option<&str>,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
) -> VerificationOutcome {
    let now = chrono::Utc::now().timestamp();
    verify_signature_at(secret, signature, timestamp, body, now)
}

/// Verify a request using its header map.
///
/// A header that is present but not visible ASCII counts as present and
/// unparsable, so it fails as a bad timestamp or a bad signature.
pub fn verify_request(secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> VerificationOutcome {
    let signature = headers.get(SIGNATURE_HEADER).map(|v| v.to_str().unwrap_or(""));
    let timestamp = headers.get(TIMESTAMP_HEADER).map(|v| v.to_str().unwrap_or(""));
    verify_signature(secret, signature, timestamp, body)
}
