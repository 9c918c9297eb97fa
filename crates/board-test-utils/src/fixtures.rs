//! Participant and registry fixtures.

use board_service::actors::{
    ActorMetrics, ChatMessage, ClientEvent, ClientHandle, CloseReason, IdGenerator, JoinOutcome,
    SessionActorHandle, SessionRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// How long a fixture waits for an expected event before failing the test.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound buffer used by `TestClient::join`.
pub const TEST_CLIENT_BUFFER: usize = 64;

/// Mailbox capacity used by `test_registry`.
pub const TEST_MAILBOX: usize = 64;

/// The receiving side of a participant, with assertion helpers.
pub struct TestClient {
    username: String,
    events: mpsc::Receiver<ClientEvent>,
}

impl TestClient {
    /// Create a participant without joining it anywhere.
    pub fn new(username: &str, capacity: usize) -> (ClientHandle, Self) {
        let (handle, events) = ClientHandle::channel(username, capacity);
        (
            handle,
            Self {
                username: username.to_string(),
                events,
            },
        )
    }

    /// Join `session` and consume the history event.
    ///
    /// Panics unless the join is accepted.
    pub async fn join(
        session: &SessionActorHandle,
        username: &str,
    ) -> (Self, Vec<Arc<ChatMessage>>) {
        let (handle, mut client) = Self::new(username, TEST_CLIENT_BUFFER);
        let outcome = session.join(handle).await.expect("session should be open");
        assert!(
            matches!(outcome, JoinOutcome::Joined { .. }),
            "{username} should join, got {outcome:?}"
        );
        let history = client.expect_history().await;
        (client, history)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Next event, or `None` once the session has let go of this client.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .unwrap_or_else(|_| panic!("{} timed out waiting for an event", self.username))
    }

    pub async fn expect_history(&mut self) -> Vec<Arc<ChatMessage>> {
        match self.next_event().await {
            Some(ClientEvent::History(messages)) => messages,
            other => panic!("{} expected history, got {other:?}", self.username),
        }
    }

    pub async fn expect_message(&mut self) -> Arc<ChatMessage> {
        match self.next_event().await {
            Some(ClientEvent::Message(message)) => message,
            other => panic!("{} expected a message, got {other:?}", self.username),
        }
    }

    /// Receive `count` messages and return their contents in arrival order.
    pub async fn expect_contents(&mut self, count: usize) -> Vec<String> {
        let mut contents = Vec::with_capacity(count);
        for _ in 0..count {
            contents.push(self.expect_message().await.content.clone());
        }
        contents
    }

    pub async fn expect_closed(&mut self) -> CloseReason {
        match self.next_event().await {
            Some(ClientEvent::Closed { reason }) => reason,
            other => panic!("{} expected a close notice, got {other:?}", self.username),
        }
    }

    /// Assert the event stream has ended.
    pub async fn expect_end(&mut self) {
        let event = self.next_event().await;
        assert!(
            event.is_none(),
            "{} expected end of stream, got {event:?}",
            self.username
        );
    }

    /// Assert nothing is waiting in the buffer and the stream is still open.
    pub fn assert_idle(&mut self) {
        match self.events.try_recv() {
            Err(TryRecvError::Empty) => {}
            other => panic!("{} expected no pending events, got {other:?}", self.username),
        }
    }
}

/// Registry with random ids and fresh metrics.
pub fn test_registry() -> SessionRegistry {
    SessionRegistry::new(TEST_MAILBOX, ActorMetrics::new())
}

/// Id generator that hands out `ids` in order, then repeats the last one.
pub fn sequential_ids(ids: &[&str]) -> IdGenerator {
    assert!(!ids.is_empty(), "sequential_ids needs at least one id");
    let ids: Vec<String> = ids.iter().map(|id| (*id).to_string()).collect();
    let next = AtomicUsize::new(0);
    Arc::new(move || {
        let index = next.fetch_add(1, Ordering::SeqCst).min(ids.len() - 1);
        ids[index].clone()
    })
}

/// Wait for the registry to drop `session_id` after its actor stopped.
pub async fn wait_until_removed(registry: &SessionRegistry, session_id: &str) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while registry.get_session(session_id).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session {session_id} was not removed"));
}
