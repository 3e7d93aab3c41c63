//! Lifecycle counters
//!
//! - `session_refresh_total` (counter): label `outcome`
//!   (`success`, `transient`, `terminal`, `superseded`, `refused`,
//!   `abandoned`)
//! - `session_refresh_coalesced_total` (counter): callers that joined an
//!   in-flight refresh instead of starting one
//! - `session_terminations_total` (counter): label `reason`
//!
//! No-ops until a recorder is installed.

/// Record how a refresh attempt ended.
pub(crate) fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a caller that waited on someone else's refresh.
pub(crate) fn record_refresh_coalesced() {
    metrics::counter!("session_refresh_coalesced_total").increment(1);
}

/// Record a transition into the logged-out state.
pub(crate) fn record_termination(reason: &'static str) {
    metrics::counter!("session_terminations_total", "reason" => reason).increment(1);
}
