// ABOUTME: Terminal stream multiplexer for the remote interactive shell
// Mounted surfaces share the terminal:data sub-stream of the event channel

/// Mounted terminals.
pub mod session;
/// Output sink trait.
pub mod surface;

pub use session::{TerminalId, TerminalMultiplexer, TerminalSession};
pub use surface::TerminalSurface;
