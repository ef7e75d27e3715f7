//! Shared-secret and request-freshness checks.
//!
//! The gate is pure: callers pass the header values and the current time, so
//! the HTTP layer can run it before reading the body or touching the database.

use crate::error::GatewayError;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the request time in epoch milliseconds.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// True iff `raw` parses as epoch milliseconds strictly less than `window_ms`
/// away from `now_ms`, in either direction.
pub fn is_valid_timestamp(raw: &str, now_ms: i64, window_ms: i64) -> bool {
    match raw.trim().parse::<i64>() {
        Ok(ts) => now_ms.abs_diff(ts) < window_ms.unsigned_abs(),
        Err(_) => false,
    }
}

/// Verifies the shared secret and the replay window.
#[derive(Debug, Clone)]
pub struct AuthGate {
    expected_key: Option<String>,
    window_ms: i64,
}

impl AuthGate {
    /// `expected_key` is `None` when the server has no key configured, in
    /// which case every request is rejected.
    pub fn new(expected_key: Option<String>, window_ms: i64) -> Self {
        Self {
            expected_key: expected_key.filter(|k| !k.is_empty()),
            window_ms,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected_key.is_some()
    }

    /// Check the key first, then the timestamp.
    pub fn check(
        &self,
        api_key: Option<&str>,
        timestamp: Option<&str>,
        now_ms: i64,
    ) -> Result<(), GatewayError> {
        let (Some(presented), Some(expected)) = (api_key, self.expected_key.as_deref()) else {
            tracing::warn!("Missing API key in request or configuration");
            return Err(GatewayError::Auth);
        };

        if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            tracing::warn!("Invalid API key provided");
            return Err(GatewayError::Auth);
        }

        match timestamp {
            Some(ts) if is_valid_timestamp(ts, now_ms, self.window_ms) => Ok(()),
            _ => {
                tracing::warn!("Invalid or expired timestamp");
                Err(GatewayError::Replay)
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
