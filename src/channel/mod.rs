// ABOUTME: Event channel multiplexing all host communication over one duplex connection
// Typed protocol, dispatch table, and the WebSocket and in-memory transports

/// Channel errors.
pub mod error;
/// Emit/subscribe facade and the transport seam.
pub mod event_channel;
/// In-process transport.
pub mod memory;
/// Event kinds, payloads and the wire envelope.
pub mod protocol;
/// WebSocket transport.
pub mod websocket;

pub use error::ChannelError;
pub use event_channel::{EventChannel, Handler, HandlerId, Transport};
pub use memory::{MemoryHost, MemoryTransport, SentEvent};
pub use protocol::{
    ClientEvent, ClientEventKind, ConnectionState, ConnectionStatus, Envelope, FileChange,
    HostEvent, HostEventKind, TerminalOutput,
};
pub use websocket::WebSocketTransport;
