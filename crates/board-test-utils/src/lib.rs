//! # Board Test Utilities
//!
//! Shared test utilities for the board service.
//!
//! This crate provides:
//! - Client fixtures (`TestClient`) that stand in for a connected participant
//! - Registry helpers (deterministic id generators, removal polling)
//! - Server test harness (`TestBoardServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use board_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let registry = test_registry();
//!     let session = registry.create_session("alice").await.unwrap();
//!
//!     let (mut bob, history) = TestClient::join(&session, "bob").await;
//!     assert!(history.is_empty());
//!
//!     session.post("alice", "hi").await.unwrap();
//!     assert_eq!(bob.expect_message().await.content, "hi");
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
