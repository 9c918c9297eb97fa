//! HTTP routes for the board service.
//!
//! Defines the Axum router and application state.

use crate::actors::SessionRegistry;
use crate::config::Config;
use crate::handlers;
use crate::observability::{health_router, HealthState};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions.
    pub registry: SessionRegistry,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/chat/sessions` - List and create sessions
/// - `/chat/sessions/:session_id` - Session summary
/// - `/chat/sessions/:session_id/ws` - WebSocket transport
/// - `/health`, `/ready` - Liveness and readiness
/// - TraceLayer for request logging
/// - 30 second request timeout (covers the upgrade handshake only)
pub fn build_routes(state: Arc<AppState>, health: Arc<HealthState>) -> Router {
    let chat_routes = Router::new()
        .route(
            "/chat/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/chat/sessions/:session_id", get(handlers::get_session))
        .route("/chat/sessions/:session_id/ws", get(handlers::session_socket))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    chat_routes
        .merge(health_router(health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
