//! Actor model implementation for the board service.
//!
//! ```text
//! SessionRegistry (one per process)
//! └── supervises N SessionActors
//!     └── SessionActor (one per live session)
//!         ├── owns the message log and roster
//!         └── fans out to N ClientHandles (bounded per-client buffers)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single writer**: only a session's actor touches its log and roster
//! - **CancellationToken propagation**: the registry's root token has one
//!   child per session, so shutdown reaches every actor
//! - **Non-blocking fan-out**: the actor never awaits a client
//! - **Message passing**: all requests go through `tokio::sync::mpsc`
//!   mailboxes with `oneshot` replies
//!
//! # Modules
//!
//! - [`registry`] - `SessionRegistry`, the table of live sessions
//! - [`session`] - `SessionActor` per live session
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Shared actor counters

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod session;

// Re-export primary types
pub use messages::*;
pub use metrics::ActorMetrics;
pub use registry::{IdGenerator, RegistryStatus, SessionRegistry};
pub use session::{SessionActor, SessionActorHandle};
