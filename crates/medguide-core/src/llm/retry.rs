//! Retry classification for upstream calls.
//!
//! The enrichment coordinator is the only caller. Single clients never retry
//! on their own.

use crate::error::UpstreamError;
use std::time::Duration;

/// Longest pause between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Fragments of transport error messages that indicate a dropped connection
/// rather than a rejected request.
const TRANSPORT_MARKERS: &[&str] = &["timed out", "connect", "connection reset", "broken pipe"];

/// Whether another attempt at the same call could succeed.
///
/// Timeouts, 408, 429 and 5xx responses are transient. Missing credentials
/// and other 4xx responses are not. Without a status code the message is
/// checked for transport failures.
pub fn is_retryable(error: &UpstreamError) -> bool {
    match error {
        UpstreamError::Timeout { .. } => true,
        UpstreamError::NotConfigured(_) => false,
        UpstreamError::Llm {
            status_code,
            message,
        }
        | UpstreamError::Search {
            status_code,
            message,
        } => match status_code {
            Some(code) => is_transient_status(*code),
            None => TRANSPORT_MARKERS.iter().any(|m| message.contains(m)),
        },
    }
}

fn is_transient_status(code: u16) -> bool {
    matches!(code, 408 | 429 | 500..=599)
}

/// Pause before retry number `attempt` (zero-based): `base_delay_ms`
/// doubled per attempt, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_delay_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}
