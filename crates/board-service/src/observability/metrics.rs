//! Metrics definitions for the board service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `board_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `reason` on delivery failures: 2 values (closed, lagging)
//! - `reason` on session closes: 4 values (see `CloseReason`)
//!
//! Session ids and usernames are never used as labels.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder and return the handle for
/// serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of live sessions.
///
/// Metric: `board_sessions_active`
pub fn set_sessions_active(count: usize) {
    // usize to f64 conversion is safe for realistic session counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("board_sessions_active").set(count as f64);
}

/// Set the number of members across all sessions.
///
/// Metric: `board_members_active`
pub fn set_members_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("board_members_active").set(count as f64);
}

/// Record a message committed to a session log.
///
/// Metric: `board_messages_posted_total`
pub fn record_message_posted() {
    counter!("board_messages_posted_total").increment(1);
}

/// Record a per-member delivery failure during fan-out.
///
/// Metric: `board_delivery_failures_total`
/// Labels: `reason` (closed, lagging)
pub fn record_delivery_failure(reason: &'static str) {
    counter!("board_delivery_failures_total", "reason" => reason).increment(1);
}

/// Record a session reaching its closing state.
///
/// Metric: `board_session_closed_total`
/// Labels: `reason` (creator_left, shutdown, lagging, abandoned)
pub fn record_session_closed(reason: &'static str) {
    counter!("board_session_closed_total", "reason" => reason).increment(1);
}

/// Record a session actor panic. Any non-zero value indicates a bug.
///
/// Metric: `board_actor_panics_total`
pub fn record_actor_panic() {
    counter!("board_actor_panics_total").increment(1);
}
