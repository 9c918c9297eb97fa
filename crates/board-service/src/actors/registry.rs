//! `SessionRegistry` - the table of live sessions.
//!
//! The registry:
//! - Creates sessions on demand under freshly generated ids
//! - Hands out `SessionActorHandle`s by id
//! - Removes a session's entry once its actor task has terminated
//! - Drains every session on process shutdown
//!
//! # Supervision
//!
//! Every session actor is paired with a supervisor task that awaits the
//! actor's `JoinHandle`, distinguishes a clean close from a panic, and then
//! removes the entry. The supervisor is spawned while the write lock that
//! inserted the entry is still held, so removal can never run ahead of the
//! insert. Supervisors hold only a weak reference to the registry.

use crate::errors::BoardError;

use super::messages::CloseReason;
use super::metrics::ActorMetrics;
use super::session::{SessionActor, SessionActorHandle};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn};

/// Produces ids for new sessions.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Registry status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStatus {
    /// Number of sessions currently registered.
    pub session_count: usize,
    /// Whether the registry has stopped accepting new sessions.
    pub is_draining: bool,
}

/// Registry entry for one session.
struct ManagedSession {
    handle: SessionActorHandle,
    created_at: i64,
}

struct RegistryInner {
    sessions: RwLock<HashMap<String, ManagedSession>>,
    /// Root token; every session runs on a child of it.
    cancel_token: CancellationToken,
    supervisors: TaskTracker,
    accepting: AtomicBool,
    mailbox_capacity: usize,
    metrics: Arc<ActorMetrics>,
    id_generator: IdGenerator,
}

impl RegistryInner {
    async fn remove(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id);

        if let Some(managed) = removed {
            self.metrics.session_removed();
            info!(
                target: "board.registry",
                session_id = %session_id,
                lifetime_ms = chrono::Utc::now().timestamp_millis() - managed.created_at,
                "Session removed"
            );
        }
    }
}

/// Shared handle to the session registry. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("mailbox_capacity", &self.inner.mailbox_capacity)
            .field("accepting", &self.inner.accepting.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Create an empty registry that names sessions with random UUIDs.
    ///
    /// A `mailbox_capacity` of zero is raised to one.
    #[must_use]
    pub fn new(mailbox_capacity: usize, metrics: Arc<ActorMetrics>) -> Self {
        Self::with_id_generator(
            mailbox_capacity,
            metrics,
            Arc::new(|| uuid::Uuid::new_v4().to_string()),
        )
    }

    /// Create an empty registry with a custom id generator.
    #[must_use]
    pub fn with_id_generator(
        mailbox_capacity: usize,
        metrics: Arc<ActorMetrics>,
        id_generator: IdGenerator,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                cancel_token: CancellationToken::new(),
                supervisors: TaskTracker::new(),
                accepting: AtomicBool::new(true),
                mailbox_capacity,
                metrics,
                id_generator,
            }),
        }
    }

    /// Ids of every live session, sorted.
    pub async fn list_session_ids(&self) -> Vec<String> {
        let sessions = self.inner.sessions.read().await;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Create a session owned by `creator`.
    ///
    /// The creator is not joined automatically; it must connect like any
    /// other participant.
    #[instrument(skip_all, name = "board.registry.create", fields(creator = %creator))]
    pub async fn create_session(&self, creator: &str) -> Result<SessionActorHandle, BoardError> {
        let session_id = (self.inner.id_generator)();

        // Checked under the write lock; `shutdown` flips the flag under the
        // same lock, so no session is inserted after draining has begun.
        let mut sessions = self.inner.sessions.write().await;
        if !self.inner.accepting.load(Ordering::SeqCst) {
            warn!(
                target: "board.registry",
                "Rejecting session creation, registry is draining"
            );
            return Err(BoardError::Draining);
        }
        if sessions.contains_key(&session_id) {
            warn!(
                target: "board.registry",
                session_id = %session_id,
                "Session id collision"
            );
            return Err(BoardError::DuplicateSession);
        }

        let (handle, task) = SessionActor::spawn(
            session_id.clone(),
            creator.to_string(),
            self.inner.mailbox_capacity,
            self.inner.cancel_token.child_token(),
            Arc::clone(&self.inner.metrics),
        );

        let managed = ManagedSession {
            handle: handle.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        sessions.insert(session_id.clone(), managed);
        self.inner.metrics.session_created();

        self.inner.supervisors.spawn(supervise(
            Arc::downgrade(&self.inner),
            session_id.clone(),
            task,
        ));

        info!(
            target: "board.registry",
            session_id = %session_id,
            total_sessions = sessions.len(),
            "Session created"
        );

        Ok(handle)
    }

    /// Look up a live session.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionActorHandle, BoardError> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(session_id)
            .map(|managed| managed.handle.clone())
            .ok_or_else(|| BoardError::SessionNotFound(session_id.to_string()))
    }

    /// Get a status snapshot.
    pub async fn status(&self) -> RegistryStatus {
        RegistryStatus {
            session_count: self.inner.sessions.read().await.len(),
            is_draining: self.is_draining(),
        }
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        !self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting sessions, close every live session, and wait up to
    /// `deadline` for their supervisors to finish.
    ///
    /// Returns `false` if the deadline passed first.
    #[instrument(skip_all, name = "board.registry.shutdown")]
    pub async fn shutdown(&self, deadline: Duration) -> bool {
        let session_count = {
            let sessions = self.inner.sessions.write().await;
            self.inner.accepting.store(false, Ordering::SeqCst);
            sessions.len()
        };
        info!(
            target: "board.registry",
            session_count,
            "Initiating graceful shutdown"
        );

        // Propagates to every session's child token.
        self.inner.cancel_token.cancel();
        self.inner.supervisors.close();

        match tokio::time::timeout(deadline, self.inner.supervisors.wait()).await {
            Ok(()) => {
                info!(target: "board.registry", "Graceful shutdown complete");
                true
            }
            Err(_) => {
                warn!(
                    target: "board.registry",
                    remaining = self.inner.supervisors.len(),
                    "Shutdown deadline exceeded"
                );
                false
            }
        }
    }
}

/// Await a session actor's termination, then drop its registry entry.
async fn supervise(
    registry: Weak<RegistryInner>,
    session_id: String,
    task: JoinHandle<CloseReason>,
) {
    let outcome = task.await;

    let Some(inner) = registry.upgrade() else {
        return;
    };

    match outcome {
        Ok(reason) => {
            info!(
                target: "board.registry",
                session_id = %session_id,
                reason = reason.as_str(),
                "Session actor exited cleanly"
            );
        }
        Err(join_error) if join_error.is_panic() => {
            error!(
                target: "board.registry",
                session_id = %session_id,
                error = ?join_error,
                "Session actor panicked"
            );
            inner.metrics.record_panic();
        }
        Err(join_error) => {
            warn!(
                target: "board.registry",
                session_id = %session_id,
                error = ?join_error,
                "Session actor task cancelled"
            );
        }
    }

    inner.remove(&session_id).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::actors::messages::{ClientEvent, ClientHandle};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(16, ActorMetrics::new())
    }

    async fn wait_until_removed(registry: &SessionRegistry, session_id: &str) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while registry.get_session(session_id).await.is_ok() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("session entry should be removed");
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let registry = registry();
        let handle = registry.create_session("alice").await.unwrap();

        let found = registry.get_session(handle.session_id()).await.unwrap();
        assert_eq!(found.session_id(), handle.session_id());
        assert_eq!(found.creator(), "alice");

        let ids = registry.list_session_ids().await;
        assert_eq!(ids, vec![handle.session_id().to_string()]);
    }

    #[tokio::test]
    async fn test_session_ids_are_uuids() {
        let registry = registry();
        let handle = registry.create_session("alice").await.unwrap();
        assert!(uuid::Uuid::parse_str(handle.session_id()).is_ok());
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let registry = registry();
        let result = registry.get_session("nope").await;
        assert!(matches!(result, Err(BoardError::SessionNotFound(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn test_duplicate_session_id_rejected() {
        let registry = SessionRegistry::with_id_generator(
            16,
            ActorMetrics::new(),
            Arc::new(|| "fixed-id".to_string()),
        );

        let first = registry.create_session("alice").await.unwrap();
        let second = registry.create_session("bob").await;
        assert!(matches!(second, Err(BoardError::DuplicateSession)));

        // The first session is untouched.
        let found = registry.get_session("fixed-id").await.unwrap();
        assert_eq!(found.creator(), first.creator());
        assert_eq!(registry.status().await.session_count, 1);
    }

    #[tokio::test]
    async fn test_entry_removed_when_creator_leaves() {
        let metrics = ActorMetrics::new();
        let registry = SessionRegistry::new(16, Arc::clone(&metrics));
        let handle = registry.create_session("alice").await.unwrap();
        let session_id = handle.session_id().to_string();
        assert_eq!(metrics.session_count(), 1);

        handle.leave("alice").await.unwrap();
        wait_until_removed(&registry, &session_id).await;

        assert!(registry.list_session_ids().await.is_empty());
        assert_eq!(metrics.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let registry = registry();
        let first = registry.create_session("alice").await.unwrap();
        let second = registry.create_session("carol").await.unwrap();

        let (bob, mut bob_rx) = ClientHandle::channel("bob", 8);
        first.join(bob).await.unwrap();
        assert!(matches!(bob_rx.recv().await, Some(ClientEvent::History(_))));

        second.post("carol", "elsewhere").await.unwrap();
        first.post("alice", "here").await.unwrap();

        match bob_rx.recv().await {
            Some(ClientEvent::Message(message)) => assert_eq!(message.content, "here"),
            other => panic!("expected message, got {other:?}"),
        }

        second.leave("carol").await.unwrap();
        wait_until_removed(&registry, second.session_id()).await;
        assert!(registry.get_session(first.session_id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_reports_sessions() {
        let registry = registry();
        registry.create_session("alice").await.unwrap();
        registry.create_session("bob").await.unwrap();

        let status = registry.status().await;
        assert_eq!(status.session_count, 2);
        assert!(!status.is_draining);
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_and_rejects_new_ones() {
        let registry = registry();
        let handle = registry.create_session("alice").await.unwrap();
        let (bob, mut bob_rx) = ClientHandle::channel("bob", 8);
        handle.join(bob).await.unwrap();
        bob_rx.recv().await.unwrap();

        let drained = registry.shutdown(Duration::from_secs(1)).await;
        assert!(drained);

        assert!(matches!(
            bob_rx.recv().await,
            Some(ClientEvent::Closed {
                reason: CloseReason::Shutdown
            })
        ));
        assert!(registry.list_session_ids().await.is_empty());
        assert!(registry.status().await.is_draining);
        assert!(matches!(
            registry.create_session("late").await,
            Err(BoardError::Draining)
        ));
    }

    #[tokio::test]
    async fn test_create_waiting_on_lock_sees_draining() {
        let registry = registry();

        // Hold the table so the create parks on the write lock.
        let guard = registry.inner.sessions.read().await;
        let pending = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.create_session("alice").await })
        };
        tokio::task::yield_now().await;

        registry.inner.accepting.store(false, Ordering::SeqCst);
        registry.inner.cancel_token.cancel();
        drop(guard);

        assert!(matches!(pending.await.unwrap(), Err(BoardError::Draining)));
        assert!(registry.list_session_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_mailbox_capacity_is_usable() {
        let registry = SessionRegistry::new(0, ActorMetrics::new());
        let handle = registry.create_session("alice").await.unwrap();

        handle.post("alice", "hi").await.unwrap();
        assert_eq!(handle.info().await.unwrap().message_count, 1);
    }
}
