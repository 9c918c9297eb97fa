//! Observability module for the board service.
//!
//! # Privacy by Default
//!
//! Handlers and actor loops use `#[instrument(skip_all)]` with explicit
//! fields. Message content is never logged, only its length. Metric labels
//! are bounded (see [`metrics`]).
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `board_sessions_active` | Gauge | none | Live sessions |
//! | `board_members_active` | Gauge | none | Joined members across sessions |
//! | `board_messages_posted_total` | Counter | none | Committed messages |
//! | `board_delivery_failures_total` | Counter | `reason` | Members dropped during fan-out |
//! | `board_session_closed_total` | Counter | `reason` | Sessions reaching `Closing` |
//! | `board_actor_panics_total` | Counter | none | Session actor panics |

pub mod health;
pub mod metrics;

// Re-exports for convenience
pub use health::{health_router, HealthResponse, HealthState};
pub use metrics::init_metrics_recorder;
