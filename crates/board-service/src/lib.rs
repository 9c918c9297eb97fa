//! Message board relay.
//!
//! Clients create chat sessions over HTTP, connect to them over WebSocket,
//! and every message posted to a session is relayed to all of its members.
//!
//! # Architecture
//!
//! ```text
//! SessionRegistry (one per process)
//! └── SessionActor (one per live session)
//!     ├── owns the append-only message log
//!     ├── owns the roster of members
//!     └── fans out to each member's bounded outbound buffer
//! ```
//!
//! A late joiner receives the whole log first, then live traffic, with no
//! gaps and no duplicates. The creator's departure ends the session for
//! everyone. One member's broken connection never affects the others.
//!
//! # Modules
//!
//! - [`actors`] - Session actors and the registry
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with HTTP mapping
//! - [`handlers`] - HTTP and WebSocket handlers
//! - [`observability`] - Health endpoints and Prometheus metrics
//! - [`routes`] - Router and shared state

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
