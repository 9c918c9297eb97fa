//! WebSocket transport for a session.
//!
//! `GET /chat/sessions/{id}/ws?username=name` upgrades to a WebSocket bound
//! to one session member:
//!
//! - Every inbound text frame is posted as one message
//! - The history and every later message go out as one JSON text frame each
//! - When the session ends the server sends a close frame
//! - When the socket ends for any reason the member leaves the session,
//!   unless a newer connection has taken over the username
//!
//! The socket is split. A writer task drains the member's event buffer into
//! the sink while the reader loop posts inbound frames, so a slow reader
//! never holds up the session actor.

use crate::actors::{
    ChatMessage, ClientEvent, ClientHandle, CloseReason, JoinOutcome, LeaveOutcome,
    SessionActorHandle,
};
use crate::errors::BoardError;
use crate::handlers::sessions::validate_username;
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub username: String,
}

/// Close code and reason sent when a session ends.
#[must_use]
pub fn close_frame_for(reason: CloseReason) -> CloseFrame<'static> {
    let (code, text) = match reason {
        CloseReason::CreatorLeft => (close_code::NORMAL, "session ended by creator"),
        CloseReason::Shutdown => (close_code::AWAY, "server shutting down"),
        CloseReason::Lagging => (close_code::POLICY, "too far behind"),
        CloseReason::Abandoned => (close_code::AWAY, "session closed"),
    };
    CloseFrame {
        code,
        reason: text.into(),
    }
}

/// Handler for GET /chat/sessions/{id}/ws
///
/// # Response
///
/// - 101 Switching Protocols: Connected as `username`
/// - 400 Bad Request: Invalid username
/// - 404 Not Found: Unknown session
#[instrument(skip_all, name = "board.ws.upgrade", fields(session_id = %session_id))]
pub async fn session_socket(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, BoardError> {
    let username = validate_username(&query.username)?;
    let session = state.registry.get_session(&session_id).await?;
    let buffer = state.config.client_buffer;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, session, username, buffer)))
}

/// Drive one member's connection until either side ends it.
async fn run_connection(
    socket: WebSocket,
    session: SessionActorHandle,
    username: String,
    buffer: usize,
) {
    let session_id = session.session_id().to_string();
    let (client, events) = ClientHandle::channel(username.clone(), buffer);
    let connection = client.connection_id();
    let (mut sink, mut stream) = socket.split();

    match session.join(client).await {
        Ok(JoinOutcome::Joined { replayed }) => {
            info!(
                target: "board.ws",
                session_id = %session_id,
                username = %username,
                connection = %connection,
                replayed,
                "Member connected"
            );
        }
        Ok(JoinOutcome::AlreadyMember) => {
            info!(
                target: "board.ws",
                session_id = %session_id,
                username = %username,
                "Username already in session, rejecting connection"
            );
            let frame = CloseFrame {
                code: close_code::POLICY,
                reason: "username already joined".into(),
            };
            let _ = sink.send(Message::Close(Some(frame))).await;
            return;
        }
        Ok(JoinOutcome::DeliveryFailed) => {
            warn!(
                target: "board.ws",
                session_id = %session_id,
                username = %username,
                "History could not be delivered, rejecting connection"
            );
            let frame = CloseFrame {
                code: close_code::ERROR,
                reason: "join failed".into(),
            };
            let _ = sink.send(Message::Close(Some(frame))).await;
            return;
        }
        Err(e) => {
            debug!(
                target: "board.ws",
                session_id = %session_id,
                error = %e,
                "Session ended before join"
            );
            let _ = sink
                .send(Message::Close(Some(close_frame_for(CloseReason::Abandoned))))
                .await;
            return;
        }
    }

    let mut writer = tokio::spawn(forward_events(sink, events));

    loop {
        tokio::select! {
            // Session closed us, or the socket stopped accepting writes.
            _ = &mut writer => break,

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(content))) => {
                        if let Err(e) = session.post(username.as_str(), content).await {
                            debug!(
                                target: "board.ws",
                                session_id = %session_id,
                                error = %e,
                                "Post rejected, session is gone"
                            );
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(
                            target: "board.ws",
                            session_id = %session_id,
                            username = %username,
                            frame = ?frame,
                            "Client initiated close"
                        );
                        break;
                    }
                    // Pings are answered by the protocol layer; binary frames are ignored.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(
                            target: "board.ws",
                            session_id = %session_id,
                            username = %username,
                            error = %e,
                            "WebSocket receive error"
                        );
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    writer.abort();

    // Scoped to this connection: if the session already dropped it and the
    // user has since reconnected, the newer connection stays.
    match session.disconnect(username.as_str(), connection).await {
        Ok(LeaveOutcome::SessionClosed) => {
            info!(
                target: "board.ws",
                session_id = %session_id,
                "Creator disconnected, session closed"
            );
        }
        Ok(_) => {
            info!(
                target: "board.ws",
                session_id = %session_id,
                username = %username,
                "Member disconnected"
            );
        }
        Err(BoardError::SessionClosed) => {
            debug!(
                target: "board.ws",
                session_id = %session_id,
                username = %username,
                "Member disconnected after session closed"
            );
        }
        Err(e) => {
            warn!(
                target: "board.ws",
                session_id = %session_id,
                error = %e,
                "Leave failed"
            );
        }
    }
}

/// Write a member's events to its socket until the session lets go of it.
async fn forward_events(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        let sent = match event {
            ClientEvent::History(messages) => {
                let mut result = Ok(());
                for message in &messages {
                    result = send_message(&mut sink, message).await;
                    if result.is_err() {
                        break;
                    }
                }
                result
            }
            ClientEvent::Message(message) => send_message(&mut sink, &message).await,
            ClientEvent::Closed { reason } => {
                let _ = sink
                    .send(Message::Close(Some(close_frame_for(reason))))
                    .await;
                return;
            }
        };

        if sent.is_err() {
            return;
        }
    }

    // The session dropped this member without a notice: its buffer overflowed.
    let _ = sink
        .send(Message::Close(Some(close_frame_for(CloseReason::Lagging))))
        .await;
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ChatMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(e) => {
            warn!(target: "board.ws", error = %e, "Failed to encode message, skipping");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_codes() {
        assert_eq!(close_frame_for(CloseReason::CreatorLeft).code, 1000);
        assert_eq!(close_frame_for(CloseReason::Shutdown).code, 1001);
        assert_eq!(close_frame_for(CloseReason::Lagging).code, 1008);
        assert_eq!(close_frame_for(CloseReason::Abandoned).code, 1001);
    }
}
