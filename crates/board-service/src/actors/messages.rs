//! Message types for session actor communication.
//!
//! Requests reach a `SessionActor` through its `tokio::sync::mpsc` mailbox.
//! Every request carries a `tokio::sync::oneshot` responder so the caller
//! suspends until the actor has processed it.
//!
//! Outbound traffic to a connected participant flows through the
//! participant's own bounded channel as `ClientEvent`s.

use crate::errors::DeliveryFailure;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

/// Messages sent to a `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// A participant wants to join the session.
    Join {
        client: ClientHandle,
        /// Response channel for the join outcome.
        respond_to: oneshot::Sender<JoinOutcome>,
    },

    /// A participant is leaving (explicitly or because its connection dropped).
    Leave {
        username: String,
        /// When set, only this connection's membership may be removed.
        connection: Option<ConnectionId>,
        /// Response channel for the leave outcome.
        respond_to: oneshot::Sender<LeaveOutcome>,
    },

    /// Append a message to the log and fan it out.
    Post {
        username: String,
        content: String,
        /// Response channel for the committed message.
        respond_to: oneshot::Sender<Arc<ChatMessage>>,
    },

    /// Get a summary of the session (for listing and health).
    GetInfo {
        /// Response channel for session info.
        respond_to: oneshot::Sender<SessionInfo>,
    },

    /// Close the session after every request queued ahead of this one.
    Shutdown {
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<()>,
    },
}

/// One posted message. Immutable once committed to a session's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Username of the poster.
    pub author: String,
    /// Server-assigned timestamp, milliseconds since the Unix epoch.
    pub posted_at: i64,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn now(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            posted_at: chrono::Utc::now().timestamp_millis(),
            content: content.into(),
        }
    }
}

/// Events delivered to a connected participant.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The session log as it stood when the join was accepted, in log order.
    History(Vec<Arc<ChatMessage>>),
    /// A message appended after the participant joined.
    Message(Arc<ChatMessage>),
    /// The session is ending; no further events follow.
    Closed { reason: CloseReason },
}

/// Why a session (or a single participant's membership) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The session creator left.
    CreatorLeft,
    /// Process-wide shutdown or an explicit shutdown request.
    Shutdown,
    /// The participant's outbound buffer overflowed.
    Lagging,
    /// Every handle to the session was dropped.
    Abandoned,
}

impl CloseReason {
    /// Returns the reason as a string for metric labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::CreatorLeft => "creator_left",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Lagging => "lagging",
            CloseReason::Abandoned => "abandoned",
        }
    }
}

/// Identifies one participant connection for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A connected participant's binding to a session.
///
/// The transport keeps the receiving half of `sink`; the session actor holds
/// this handle for as long as the participant is a member. Dropping the last
/// sender closes the participant's event stream.
#[derive(Debug)]
pub struct ClientHandle {
    username: String,
    connection_id: ConnectionId,
    sink: mpsc::Sender<ClientEvent>,
}

impl ClientHandle {
    /// Wrap an existing outbound sink.
    #[must_use]
    pub fn new(username: impl Into<String>, sink: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            username: username.into(),
            connection_id: ConnectionId::next(),
            sink,
        }
    }

    /// Create a handle together with the receiving half of its sink.
    ///
    /// A `capacity` of zero is raised to one.
    #[must_use]
    pub fn channel(
        username: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (sink, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(username, sink), receiver)
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Hand an event to the participant without waiting.
    ///
    /// Never blocks the caller: a full buffer is reported as
    /// `DeliveryFailure::Lagging`.
    pub fn try_deliver(&self, event: ClientEvent) -> Result<(), DeliveryFailure> {
        self.sink.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::Lagging,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The participant was added; `replayed` log entries were handed over.
    Joined { replayed: usize },
    /// A member with this username already exists; nothing changed.
    AlreadyMember,
    /// The history could not be handed to the new participant, so it was
    /// not added.
    DeliveryFailed,
}

/// Result of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The member was removed.
    Left,
    /// No member had this username, or the member belongs to a different
    /// connection; nothing changed.
    NotMember,
    /// The creator left and the session is closing.
    SessionClosed,
}

/// Summary of a session's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session ID.
    pub session_id: String,
    /// Username of the creator.
    pub creator: String,
    /// Creation timestamp, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Current number of members.
    pub member_count: usize,
    /// Number of messages in the log.
    pub message_count: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_wire_shape() {
        let message = ChatMessage {
            author: "alice".to_string(),
            posted_at: 1_700_000_000_123,
            content: "hi".to_string(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "author": "alice",
                "postedAt": 1_700_000_000_123_i64,
                "content": "hi"
            })
        );
    }

    #[test]
    fn test_chat_message_now_is_stamped() {
        let before = chrono::Utc::now().timestamp_millis();
        let message = ChatMessage::now("bob", "hello");
        let after = chrono::Utc::now().timestamp_millis();

        assert_eq!(message.author, "bob");
        assert!(message.posted_at >= before && message.posted_at <= after);
    }

    #[test]
    fn test_try_deliver_reports_full_buffer() {
        let (client, _rx) = ClientHandle::channel("alice", 1);
        let message = Arc::new(ChatMessage::now("alice", "one"));

        assert!(client
            .try_deliver(ClientEvent::Message(Arc::clone(&message)))
            .is_ok());
        assert_eq!(
            client.try_deliver(ClientEvent::Message(message)),
            Err(DeliveryFailure::Lagging)
        );
    }

    #[test]
    fn test_try_deliver_reports_closed_sink() {
        let (client, rx) = ClientHandle::channel("alice", 4);
        drop(rx);

        assert_eq!(
            client.try_deliver(ClientEvent::Closed {
                reason: CloseReason::Shutdown
            }),
            Err(DeliveryFailure::Closed)
        );
    }

    #[test]
    fn test_zero_capacity_channel_holds_one_event() {
        let (client, mut rx) = ClientHandle::channel("alice", 0);
        let message = Arc::new(ChatMessage::now("alice", "one"));

        assert!(client.try_deliver(ClientEvent::Message(message)).is_ok());
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::Message(m)) if m.content == "one"));
    }

    #[test]
    fn test_connection_ids_are_distinct_per_handle() {
        let (first, _rx1) = ClientHandle::channel("bob", 4);
        let (second, _rx2) = ClientHandle::channel("bob", 4);

        assert_ne!(first.connection_id(), second.connection_id());
        assert_eq!(first.connection_id(), first.connection_id());
    }

    #[test]
    fn test_close_reason_labels() {
        assert_eq!(CloseReason::CreatorLeft.as_str(), "creator_left");
        assert_eq!(CloseReason::Shutdown.as_str(), "shutdown");
        assert_eq!(CloseReason::Lagging.as_str(), "lagging");
        assert_eq!(CloseReason::Abandoned.as_str(), "abandoned");
    }

    #[test]
    fn test_session_info_serializes_camel_case() {
        let info = SessionInfo {
            session_id: "s1".to_string(),
            creator: "alice".to_string(),
            created_at: 1,
            member_count: 2,
            message_count: 3,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["memberCount"], 2);
        assert_eq!(json["messageCount"], 3);
    }
}
