// ABOUTME: Session controller and the loop that drives it
// Front-ends talk to a running session through SessionHandle and SessionNotice

/// Session state and operations.
pub mod controller;
/// Commands in, notices out.
pub mod events;
/// The loop and its handle.
pub mod runtime;

pub use controller::{SessionConfig, SessionController};
pub use events::{SessionCommand, SessionNotice};
pub use runtime::{Session, SessionHandle};
