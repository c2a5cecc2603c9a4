// ABOUTME: Client-side session sync layer for a remote IDE host
// Exposes the event channel, workspace tree, edit buffers, terminals and session loop

//! Keeps a local view of a remote workspace in sync with its session host.

/// Open files and debounced persistence.
pub mod buffer;
/// Event protocol, dispatch table and transports.
pub mod channel;
/// TOML configuration.
pub mod config;
/// Request/response calls to the session host.
pub mod host;
/// The session loop and its controller.
pub mod session;
/// Terminal surfaces bound to the shell stream.
pub mod terminal;
/// Workspace tree model and view state.
pub mod workspace;
