//! Board Service
//!
//! Real-time message board relay: chat sessions over HTTP and WebSocket.
//!
//! # Startup
//!
//! 1. Load configuration from the environment
//! 2. Initialize tracing (text or JSON)
//! 3. Initialize Prometheus metrics recorder
//! 4. Create the session registry
//! 5. Bind and serve the HTTP router (sessions, WebSocket, health, metrics)
//! 6. Wait for shutdown signal
//!
//! # Shutdown
//!
//! Readiness drops first, then every session is closed (which ends its
//! WebSockets), then the HTTP server stops. Each wait is bounded by
//! `BOARD_SHUTDOWN_TIMEOUT_SECONDS`.

use axum::Router;
use board_service::actors::{ActorMetrics, SessionRegistry};
use board_service::config::Config;
use board_service::observability::{init_metrics_recorder, HealthState};
use board_service::routes::{build_routes, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration comes first: it decides the log format.
    let config = Config::from_env()?;

    init_tracing(config.log_json);

    info!("Starting Board Service");
    info!(
        bind_address = %config.bind_address,
        session_mailbox = config.session_mailbox,
        client_buffer = config.client_buffer,
        shutdown_timeout_seconds = config.shutdown_timeout_seconds,
        "Configuration loaded successfully"
    );

    // This must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());
    let metrics = ActorMetrics::new();
    let registry = SessionRegistry::new(config.session_mailbox, Arc::clone(&metrics));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    let state = Arc::new(AppState {
        registry: registry.clone(),
        config: config.clone(),
    });

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = build_routes(state, Arc::clone(&health_state)).merge(metrics_router);

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {addr}: {e}")
    })?;
    info!(addr = %addr, "HTTP server bound successfully");

    let shutdown_token = CancellationToken::new();
    let server_shutdown_token = shutdown_token.child_token();
    let server_handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_shutdown_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    health_state.set_ready();
    info!(addr = %addr, "Board Service running - press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop sending traffic
    health_state.set_not_ready();

    // Closing sessions first ends every open WebSocket, which lets the HTTP
    // server's graceful shutdown finish.
    if !registry.shutdown(config.shutdown_timeout()).await {
        warn!("Some sessions did not close before the deadline");
    }

    shutdown_token.cancel();
    if tokio::time::timeout(config.shutdown_timeout(), server_handle)
        .await
        .is_err()
    {
        warn!("HTTP server did not stop before the deadline");
    }

    info!(
        messages_posted = metrics.messages_posted(),
        "Board Service shutdown complete"
    );
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "board_service=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
