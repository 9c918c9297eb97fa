//! Test server harness for E2E testing
//!
//! Provides `TestBoardServer` for spawning real board server instances in
//! tests.

use board_service::actors::{ActorMetrics, SessionRegistry};
use board_service::config::Config;
use board_service::observability::HealthState;
use board_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the board server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_e2e() -> Result<(), anyhow::Error> {
///     let server = TestBoardServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestBoardServer {
    addr: SocketAddr,
    registry: SessionRegistry,
    health: Arc<HealthState>,
    metrics: Arc<ActorMetrics>,
    _handle: JoinHandle<()>,
}

impl TestBoardServer {
    /// Spawn a ready server on a random local port.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([(
            "BOARD_BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        )]);
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let metrics = ActorMetrics::new();
        let registry = SessionRegistry::new(config.session_mailbox, Arc::clone(&metrics));
        let health = Arc::new(HealthState::new());
        health.set_ready();

        let state = Arc::new(AppState {
            registry: registry.clone(),
            config,
        });

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, Arc::clone(&health));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            registry,
            health,
            metrics,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL for joining `session_id` as `username`.
    pub fn ws_url(&self, session_id: &str, username: &str) -> String {
        format!(
            "ws://{}/chat/sessions/{}/ws?username={}",
            self.addr, session_id, username
        )
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The registry behind the server, for driving sessions directly.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn metrics(&self) -> &ActorMetrics {
        &self.metrics
    }
}

impl Drop for TestBoardServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
