//! Slack request signature verification.
//!
//! Slack signs each request with HMAC-SHA256 over `v0:<timestamp>:<body>`
//! and sends the result as `X-Slack-Signature: v0=<hex digest>`.
//! Reference: https://api.slack.com/authentication/verifying-requests-from-slack

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request timestamp (Unix seconds).
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Header carrying the versioned signature.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Maximum distance in seconds between the request timestamp and now.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

const SIGNATURE_VERSION: &str = "v0";
const SIGNATURE_PREFIX: &str = "v0=";

/// Verify a Slack request signature against the current wall clock.
///
/// An empty `signing_secret` disables verification and every request
/// passes.
pub fn verify_slack_signature(
    signing_secret: &[u8],
    body: &[u8],
    timestamp: &str,
    signature: &str,
) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    verify_slack_signature_at(signing_secret, body, timestamp, signature, now)
}

/// Verify a Slack request signature as of `now` (Unix seconds).
pub fn verify_slack_signature_at(
    signing_secret: &[u8],
    body: &[u8],
    timestamp: &str,
    signature: &str,
    now: i64,
) -> bool {
    if signing_secret.is_empty() {
        return true;
    }

    if timestamp.is_empty() || signature.is_empty() {
        warn!(
            has_timestamp = !timestamp.is_empty(),
            has_signature = !signature.is_empty(),
            "slack_signature_missing_fields"
        );
        return false;
    }

    let request_time: i64 = match timestamp.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!(timestamp = %timestamp, "slack_signature_invalid_timestamp");
            return false;
        }
    };

    // Widened so extreme timestamps cannot overflow.
    let skew = (i128::from(now) - i128::from(request_time)).abs();
    if skew > i128::from(MAX_TIMESTAMP_SKEW_SECS) {
        warn!(
            request_time = request_time,
            current_time = now,
            max_skew_seconds = MAX_TIMESTAMP_SKEW_SECS,
            "slack_signature_stale"
        );
        return false;
    }

    let provided = match signature.strip_prefix(SIGNATURE_PREFIX) {
        Some(hash) => hash,
        None => {
            warn!("slack_signature_unknown_version");
            return false;
        }
    };

    let expected = match compute_signature(signing_secret, timestamp, body) {
        Some(sig) => sig,
        None => {
            warn!("slack_signature_invalid_key");
            return false;
        }
    };

    let valid = constant_time_compare(expected.as_bytes(), provided.as_bytes());

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = provided.len(),
            "slack_signature_mismatch"
        );
    }

    valid
}

/// Lowercase hex HMAC-SHA256 of `v0:<timestamp>:<body>`, without the `v0=`
/// prefix.
pub fn compute_signature(signing_secret: &[u8], timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_secret).ok()?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Full `X-Slack-Signature` header value for a request.
pub fn signature_header_value(
    signing_secret: &[u8],
    timestamp: &str,
    body: &[u8],
) -> Option<String> {
    compute_signature(signing_secret, timestamp, body).map(|sig| format!("{SIGNATURE_PREFIX}{sig}"))
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
