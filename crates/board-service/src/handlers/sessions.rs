//! Session handlers.
//!
//! - `GET /chat/sessions` - List live session ids
//! - `POST /chat/sessions` - Create a session
//! - `GET /chat/sessions/{id}` - Session summary

use crate::actors::SessionInfo;
use crate::errors::BoardError;
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// Request body for `POST /chat/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Username of the session creator.
    pub user: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<String>,
}

/// Trim and check a username supplied by a client.
pub fn validate_username(raw: &str) -> Result<String, BoardError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(BoardError::BadRequest(
            "Username must not be empty".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(BoardError::BadRequest(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(username.to_string())
}

/// Handler for GET /chat/sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let sessions = state.registry.list_session_ids().await;
    Json(SessionListResponse { sessions })
}

/// Handler for POST /chat/sessions
///
/// # Response
///
/// - 201 Created: `{"sessionId": ...}`
/// - 400 Bad Request: Missing or invalid `user`
/// - 409 Conflict: Generated id collided (retryable)
/// - 503 Service Unavailable: Shutting down
#[instrument(skip_all, name = "board.http.create_session")]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), BoardError> {
    let Json(request) = payload.map_err(|e| BoardError::BadRequest(e.body_text()))?;
    let creator = validate_username(&request.user)?;

    let handle = state.registry.create_session(&creator).await?;

    info!(
        target: "board.http",
        session_id = %handle.session_id(),
        creator = %creator,
        "Session created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: handle.session_id().to_string(),
        }),
    ))
}

/// Handler for GET /chat/sessions/{id}
#[instrument(skip_all, name = "board.http.get_session", fields(session_id = %session_id))]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, BoardError> {
    let handle = state.registry.get_session(&session_id).await?;
    let info = handle.info().await?;
    Ok(Json(info))
}
