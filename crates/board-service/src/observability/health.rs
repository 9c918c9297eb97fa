//! Liveness and readiness endpoints.
//!
//! Both routes answer with `{"timeStamp": <unix-ms>, "status": <code>}`,
//! where `status` repeats the HTTP status code:
//!
//! - `GET /health`: 200 whenever the process can serve a request
//! - `GET /ready`: 200 while new sessions are accepted, 503 before startup
//!   completes and once draining begins
//!
//! `/metrics` is mounted by the binary, next to the Prometheus handle.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness flag shared between `main` and the health routes.
#[derive(Debug, Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    /// Starts out not ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Draining has begun; `/ready` reports 503 from now on.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Response body for `/health` and `/ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// When the request was answered, milliseconds since the Unix epoch.
    pub time_stamp: i64,
    /// The HTTP status code of the response.
    pub status: u16,
}

impl HealthResponse {
    fn reply(status: StatusCode) -> (StatusCode, Json<Self>) {
        let body = Self {
            time_stamp: chrono::Utc::now().timestamp_millis(),
            status: status.as_u16(),
        };
        (status, Json(body))
    }
}

/// Router serving `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(health_state)
}

async fn health() -> (StatusCode, Json<HealthResponse>) {
    HealthResponse::reply(StatusCode::OK)
}

async fn ready(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthResponse>) {
    if state.is_ready() {
        HealthResponse::reply(StatusCode::OK)
    } else {
        HealthResponse::reply(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    async fn fetch(state: Arc<HealthState>, uri: &str) -> (StatusCode, Option<HealthResponse>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = health_router(state).oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[test]
    fn test_starts_not_ready() {
        let state = HealthState::new();
        assert!(!state.is_ready());

        state.set_ready();
        assert!(state.is_ready());
        state.set_not_ready();
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_health_reports_timestamp_and_status() {
        let before = chrono::Utc::now().timestamp_millis();
        let (status, body) = fetch(Arc::new(HealthState::new()), "/health").await;
        let after = chrono::Utc::now().timestamp_millis();

        assert_eq!(status, StatusCode::OK);
        let body = body.expect("health body should be JSON");
        assert_eq!(body.status, 200);
        assert!(body.time_stamp >= before && body.time_stamp <= after);
    }

    #[tokio::test]
    async fn test_health_body_field_names() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = health_router(Arc::new(HealthState::new()))
            .oneshot(request)
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert!(json["timeStamp"].is_i64());
        assert_eq!(json["status"], 200);
    }

    #[tokio::test]
    async fn test_ready_follows_state() {
        let state = Arc::new(HealthState::new());

        let (status, body) = fetch(Arc::clone(&state), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.map(|b| b.status), Some(503));

        state.set_ready();
        let (status, body) = fetch(Arc::clone(&state), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.map(|b| b.status), Some(200));

        state.set_not_ready();
        let (status, _) = fetch(Arc::clone(&state), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        // Draining never affects liveness.
        let (status, _) = fetch(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let (status, body) = fetch(Arc::new(HealthState::new()), "/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_none());
    }
}
