//! HTTP request handlers for the board service.

pub mod sessions;
pub mod ws;

pub use sessions::{create_session, get_session, list_sessions};
pub use ws::session_socket;
