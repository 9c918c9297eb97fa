//! `SessionActor` - per-session actor that owns one chat room.
//!
//! Each `SessionActor`:
//! - Owns the session's roster (members keyed by username) and its
//!   append-only message log
//! - Is the only code that reads or writes either
//! - Processes `SessionMessage`s one at a time, in mailbox order, which
//!   gives every member the same total order of joins, leaves and posts
//!
//! # Delivery
//!
//! Fan-out never awaits a participant. Each member has a bounded outbound
//! buffer and the actor uses `try_send`; a member whose buffer is closed or
//! full is dropped from the roster and delivery continues for everyone else.
//!
//! # Lifecycle
//!
//! `Running -> Closing`. The session closes when its creator leaves, when a
//! `Shutdown` request is processed, when its cancellation token fires, or
//! when every handle is dropped. Closing notifies and disconnects every
//! member, stops the mailbox, and ends the task. The task's return value is
//! the close reason, which the registry consumes to remove the session.

use crate::errors::{BoardError, DeliveryFailure};

use super::messages::{
    ChatMessage, ClientEvent, ClientHandle, CloseReason, ConnectionId, JoinOutcome,
    LeaveOutcome, SessionInfo, SessionMessage,
};
use super::metrics::ActorMetrics;

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Handle to a `SessionActor`.
///
/// Cheap to clone. Every request waits for the actor to process it; once the
/// actor has stopped, requests fail with `BoardError::SessionClosed`.
#[derive(Clone, Debug)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    session_id: String,
    creator: String,
}

impl SessionActorHandle {
    /// Get the session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the creator's username.
    #[must_use]
    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// Add a participant to the session.
    ///
    /// On `JoinOutcome::Joined` the participant's sink has already received
    /// the full history, ahead of any message posted afterwards.
    pub async fn join(&self, client: ClientHandle) -> Result<JoinOutcome, BoardError> {
        self.request(|respond_to| SessionMessage::Join { client, respond_to })
            .await
    }

    /// Remove a participant. Leaving as the creator closes the session.
    pub async fn leave(&self, username: impl Into<String>) -> Result<LeaveOutcome, BoardError> {
        let username = username.into();
        self.request(|respond_to| SessionMessage::Leave {
            username,
            connection: None,
            respond_to,
        })
        .await
    }

    /// Leave on behalf of one connection.
    ///
    /// Does nothing if `username` is currently held by a different
    /// connection, e.g. after this one was dropped and the user rejoined.
    pub async fn disconnect(
        &self,
        username: impl Into<String>,
        connection: ConnectionId,
    ) -> Result<LeaveOutcome, BoardError> {
        let username = username.into();
        self.request(|respond_to| SessionMessage::Leave {
            username,
            connection: Some(connection),
            respond_to,
        })
        .await
    }

    /// Post a message. Returns the message as committed to the log.
    pub async fn post(
        &self,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Arc<ChatMessage>, BoardError> {
        let username = username.into();
        let content = content.into();
        self.request(|respond_to| SessionMessage::Post {
            username,
            content,
            respond_to,
        })
        .await
    }

    /// Get a summary of the session.
    pub async fn info(&self) -> Result<SessionInfo, BoardError> {
        self.request(|respond_to| SessionMessage::GetInfo { respond_to })
            .await
    }

    /// Close the session after all requests already queued.
    pub async fn shutdown(&self) -> Result<(), BoardError> {
        self.request(|respond_to| SessionMessage::Shutdown { respond_to })
            .await
    }

    /// Close the session immediately, ahead of queued requests.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if the actor has stopped accepting requests.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, BoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| BoardError::SessionClosed)?;

        // The responder is dropped unanswered when the actor closes with this
        // request still queued.
        rx.await.map_err(|_| BoardError::SessionClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Running,
    Closing,
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    /// Session ID.
    session_id: String,
    /// Username whose departure ends the session.
    creator: String,
    /// Creation timestamp (ms since epoch).
    created_at: i64,
    /// Request mailbox.
    receiver: mpsc::Receiver<SessionMessage>,
    /// Cancellation token (child of the registry's root token).
    cancel_token: CancellationToken,
    /// Message log, in commit order.
    messages: Vec<Arc<ChatMessage>>,
    /// Current members by username.
    members: HashMap<String, ClientHandle>,
    state: SessionState,
    /// Shared actor metrics.
    metrics: Arc<ActorMetrics>,
}

impl SessionActor {
    /// Spawn a new session actor with an empty log and roster.
    ///
    /// Returns a handle and the task join handle. The task resolves to the
    /// reason the session closed. A `mailbox_capacity` of zero is raised to
    /// one.
    pub fn spawn(
        session_id: String,
        creator: String,
        mailbox_capacity: usize,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (SessionActorHandle, JoinHandle<CloseReason>) {
        let (sender, receiver) = mpsc::channel(mailbox_capacity.max(1));

        let actor = Self {
            session_id: session_id.clone(),
            creator: creator.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
            receiver,
            cancel_token: cancel_token.clone(),
            messages: Vec::new(),
            members: HashMap::new(),
            state: SessionState::Running,
            metrics,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionActorHandle {
            sender,
            cancel_token,
            session_id,
            creator,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "board.actor.session", fields(session_id = %self.session_id))]
    async fn run(mut self) -> CloseReason {
        info!(
            target: "board.actor.session",
            session_id = %self.session_id,
            "SessionActor started"
        );

        let reason = loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "board.actor.session",
                        session_id = %self.session_id,
                        "SessionActor received cancellation signal"
                    );
                    break CloseReason::Shutdown;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            if let ControlFlow::Break(reason) = self.handle_message(message) {
                                break reason;
                            }
                        }
                        None => {
                            info!(
                                target: "board.actor.session",
                                session_id = %self.session_id,
                                "SessionActor channel closed, exiting"
                            );
                            break CloseReason::Abandoned;
                        }
                    }
                }
            }
        };

        self.close(reason);

        info!(
            target: "board.actor.session",
            session_id = %self.session_id,
            reason = reason.as_str(),
            messages = self.messages.len(),
            "SessionActor stopped"
        );

        reason
    }

    /// Handle a single request. `Break` ends the loop.
    fn handle_message(&mut self, message: SessionMessage) -> ControlFlow<CloseReason> {
        match message {
            SessionMessage::Join { client, respond_to } => {
                let outcome = self.handle_join(client);
                let _ = respond_to.send(outcome);
                ControlFlow::Continue(())
            }

            SessionMessage::Leave {
                username,
                connection,
                respond_to,
            } => {
                let outcome = self.handle_leave(&username, connection);
                let _ = respond_to.send(outcome);
                if outcome == LeaveOutcome::SessionClosed {
                    ControlFlow::Break(CloseReason::CreatorLeft)
                } else {
                    ControlFlow::Continue(())
                }
            }

            SessionMessage::Post {
                username,
                content,
                respond_to,
            } => {
                let committed = self.handle_post(username, content);
                let _ = respond_to.send(committed);
                ControlFlow::Continue(())
            }

            SessionMessage::GetInfo { respond_to } => {
                let _ = respond_to.send(self.info());
                ControlFlow::Continue(())
            }

            SessionMessage::Shutdown { respond_to } => {
                self.close(CloseReason::Shutdown);
                let _ = respond_to.send(());
                ControlFlow::Break(CloseReason::Shutdown)
            }
        }
    }

    /// Handle a participant joining.
    ///
    /// The history snapshot goes into the new member's buffer before the
    /// member is visible to fan-out, so nothing is missed or duplicated.
    fn handle_join(&mut self, client: ClientHandle) -> JoinOutcome {
        if self.members.contains_key(client.username()) {
            debug!(
                target: "board.actor.session",
                session_id = %self.session_id,
                username = %client.username(),
                "Duplicate join ignored"
            );
            return JoinOutcome::AlreadyMember;
        }

        let replayed = self.messages.len();
        if let Err(failure) = client.try_deliver(ClientEvent::History(self.messages.clone())) {
            self.metrics.delivery_failed(failure);
            warn!(
                target: "board.actor.session",
                session_id = %self.session_id,
                username = %client.username(),
                failure = %failure,
                "Could not deliver history, join rejected"
            );
            return JoinOutcome::DeliveryFailed;
        }

        let username = client.username().to_string();
        self.members.insert(username.clone(), client);
        self.metrics.member_joined();

        info!(
            target: "board.actor.session",
            session_id = %self.session_id,
            username = %username,
            replayed,
            total_members = self.members.len(),
            "Member joined"
        );

        JoinOutcome::Joined { replayed }
    }

    /// Handle a participant leaving.
    ///
    /// With `connection` set, a member under `username` that belongs to
    /// another connection is left alone.
    fn handle_leave(&mut self, username: &str, connection: Option<ConnectionId>) -> LeaveOutcome {
        if let (Some(connection), Some(current)) = (connection, self.members.get(username)) {
            if current.connection_id() != connection {
                debug!(
                    target: "board.actor.session",
                    session_id = %self.session_id,
                    username = %username,
                    stale = %connection,
                    current = %current.connection_id(),
                    "Leave from replaced connection ignored"
                );
                return LeaveOutcome::NotMember;
            }
        }

        if username == self.creator {
            info!(
                target: "board.actor.session",
                session_id = %self.session_id,
                remaining_members = self.members.len(),
                "Creator left, closing session"
            );
            self.close(CloseReason::CreatorLeft);
            return LeaveOutcome::SessionClosed;
        }

        match self.members.remove(username) {
            Some(_client) => {
                self.metrics.members_left(1);
                info!(
                    target: "board.actor.session",
                    session_id = %self.session_id,
                    username = %username,
                    remaining_members = self.members.len(),
                    "Member left"
                );
                LeaveOutcome::Left
            }
            None => {
                debug!(
                    target: "board.actor.session",
                    session_id = %self.session_id,
                    username = %username,
                    "Leave for unknown member ignored"
                );
                LeaveOutcome::NotMember
            }
        }
    }

    /// Append a message and fan it out to every member, author included.
    fn handle_post(&mut self, username: String, content: String) -> Arc<ChatMessage> {
        let message = Arc::new(ChatMessage::now(username, content));
        self.messages.push(Arc::clone(&message));
        self.metrics.message_posted();

        debug!(
            target: "board.actor.session",
            session_id = %self.session_id,
            author = %message.author,
            content_len = message.content.len(),
            log_len = self.messages.len(),
            "Message committed"
        );

        self.broadcast(&message);
        message
    }

    fn broadcast(&mut self, message: &Arc<ChatMessage>) {
        let failed: Vec<(String, DeliveryFailure)> = self
            .members
            .iter()
            .filter_map(|(username, client)| {
                client
                    .try_deliver(ClientEvent::Message(Arc::clone(message)))
                    .err()
                    .map(|failure| (username.clone(), failure))
            })
            .collect();

        for (username, failure) in failed {
            self.drop_member(&username, failure);
        }
    }

    /// Remove a member whose sink failed. The rest of the room is unaffected.
    fn drop_member(&mut self, username: &str, failure: DeliveryFailure) {
        let Some(client) = self.members.remove(username) else {
            return;
        };

        self.metrics.delivery_failed(failure);
        self.metrics.members_left(1);

        match failure {
            DeliveryFailure::Closed => {
                debug!(
                    target: "board.actor.session",
                    session_id = %self.session_id,
                    username = %username,
                    "Member connection already closed, removed"
                );
            }
            DeliveryFailure::Lagging => {
                warn!(
                    target: "board.actor.session",
                    session_id = %self.session_id,
                    username = %username,
                    "Member outbound buffer full, disconnecting"
                );
                // Best effort: the buffer is full so this usually fails, and
                // dropping the handle closes the stream either way.
                let _ = client.try_deliver(ClientEvent::Closed {
                    reason: CloseReason::Lagging,
                });
            }
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            creator: self.creator.clone(),
            created_at: self.created_at,
            member_count: self.members.len(),
            message_count: self.messages.len(),
        }
    }

    /// Enter `Closing`: disconnect every member and stop the mailbox.
    ///
    /// Idempotent. Requests still queued are dropped with the receiver and
    /// their callers see `SessionClosed`.
    fn close(&mut self, reason: CloseReason) {
        if self.state == SessionState::Closing {
            return;
        }
        self.state = SessionState::Closing;

        let released = self.members.len();
        for (username, client) in self.members.drain() {
            if let Err(failure) = client.try_deliver(ClientEvent::Closed { reason }) {
                debug!(
                    target: "board.actor.session",
                    session_id = %self.session_id,
                    username = %username,
                    failure = %failure,
                    "Close notice not delivered"
                );
            }
        }
        self.metrics.members_left(released);
        self.metrics.session_closed(reason);
        self.receiver.close();

        info!(
            target: "board.actor.session",
            session_id = %self.session_id,
            reason = reason.as_str(),
            disconnected = released,
            "Session closing"
        );
    }
}
