// ABOUTME: Error types for the host event channel
// Covers undelivered emissions, unknown events, and transport failures

use thiserror::Error;

/// Failures of the event channel and its transports.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The emission could not be handed to a live connection. Never retried.
    #[error("Channel dropped: {0}")]
    ChannelDropped(String),

    /// An envelope named an event outside the protocol.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// An envelope payload did not match its event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The transport could not connect or lost its socket.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No connection within the configured timeout.
    #[error("Connection timeout after {0:?}")]
    ConnectTimeout(std::time::Duration),
}

impl ChannelError {
    /// Whether the emission was refused for lack of a connection.
    pub fn is_dropped(&self) -> bool {
        matches!(self, ChannelError::ChannelDropped(_))
    }
}
