//! Shared counters for the session actor system.
//!
//! `ActorMetrics` is shared between the registry, every session actor, and
//! the HTTP layer. All fields are atomic for lock-free concurrent access.
//! Every update is mirrored to the Prometheus recorder.

use crate::errors::DeliveryFailure;
use crate::observability::metrics as prom;

use super::messages::CloseReason;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Aggregated metrics for the actor system.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Sessions currently registered.
    active_sessions: AtomicUsize,
    /// Members currently joined, across all sessions.
    active_members: AtomicUsize,
    /// Messages committed since startup.
    messages_posted: AtomicU64,
    /// Per-member delivery failures since startup.
    delivery_failures: AtomicU64,
    /// Session actor panics (indicates bugs).
    actor_panics: AtomicU64,
}

impl ActorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn session_created(&self) {
        let count = self.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_sessions_active(count);
    }

    pub fn session_removed(&self) {
        let count = self
            .active_sessions
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        prom::set_sessions_active(count);
    }

    pub fn session_closed(&self, reason: CloseReason) {
        prom::record_session_closed(reason.as_str());
    }

    pub fn member_joined(&self) {
        let count = self.active_members.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_members_active(count);
    }

    /// Decrement the member count by `n` (a closing session releases all of
    /// its members at once).
    pub fn members_left(&self, n: usize) {
        if n == 0 {
            return;
        }
        let count = self
            .active_members
            .fetch_sub(n, Ordering::Relaxed)
            .saturating_sub(n);
        prom::set_members_active(count);
    }

    pub fn message_posted(&self) {
        self.messages_posted.fetch_add(1, Ordering::Relaxed);
        prom::record_message_posted();
    }

    pub fn delivery_failed(&self, failure: DeliveryFailure) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        prom::record_delivery_failure(failure.as_str());
    }

    /// Record a session actor panic.
    pub fn record_panic(&self) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        prom::record_actor_panic();
        tracing::error!(
            target: "board.actor.panic",
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Session actor panic detected - indicates bug, investigation required"
        );
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.active_members.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_posted(&self) -> u64 {
        self.messages_posted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn actor_panics(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }
}
