// ABOUTME: Event protocol shared by every transport between the client and the session host
// Closed enums for event kinds plus the JSON envelope used on the wire

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::channel::error::ChannelError;

// ============================================
// Event kinds
// ============================================

/// Events the client sends to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    /// Persist a file's full content.
    FileChange,
    /// Forward shell input.
    TerminalWrite,
}

/// Events the host pushes to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    /// Shell output.
    TerminalData,
    /// Workspace structure changed.
    FileRefresh,
}

impl ClientEventKind {
    /// Event name as it appears in the envelope.
    pub const fn wire_name(self) -> &'static str {
        match self {
            ClientEventKind::FileChange => "file:change",
            ClientEventKind::TerminalWrite => "terminal:write",
        }
    }
}

impl HostEventKind {
    /// Event name as it appears in the envelope.
    pub const fn wire_name(self) -> &'static str {
        match self {
            HostEventKind::TerminalData => "terminal:data",
            HostEventKind::FileRefresh => "file:refresh",
        }
    }
}

impl fmt::Display for ClientEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl fmt::Display for HostEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ClientEventKind {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file:change" => Ok(ClientEventKind::FileChange),
            "terminal:write" => Ok(ClientEventKind::TerminalWrite),
            other => Err(ChannelError::UnknownEvent(other.to_string())),
        }
    }
}

impl FromStr for HostEventKind {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terminal:data" => Ok(HostEventKind::TerminalData),
            "file:refresh" => Ok(HostEventKind::FileRefresh),
            other => Err(ChannelError::UnknownEvent(other.to_string())),
        }
    }
}

// ============================================
// Typed events
// ============================================

/// Client → host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Persist a file.
    FileChange(FileChange),
    /// Raw keystrokes for the shell.
    TerminalWrite(String),
}

/// Payload of `file:change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path below the workspace root.
    pub path: String,
    /// Full text, never a diff.
    pub content: String,
}

/// Host → client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Shell output, ANSI sequences included.
    TerminalData(TerminalOutput),
    /// The payload names the changed path when the host provides one. It is
    /// informational only: every refresh re-fetches the whole tree.
    FileRefresh(Option<String>),
}

/// Payload of `terminal:data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalOutput {
    /// Raw output chunk.
    pub data: String,
}

impl ClientEvent {
    /// Build a `file:change` event.
    pub fn file_change(path: impl Into<String>, content: impl Into<String>) -> Self {
        ClientEvent::FileChange(FileChange {
            path: path.into(),
            content: content.into(),
        })
    }

    /// Build a `terminal:write` event.
    pub fn terminal_write(data: impl Into<String>) -> Self {
        ClientEvent::TerminalWrite(data.into())
    }

    /// Kind of this event.
    pub const fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::FileChange(_) => ClientEventKind::FileChange,
            ClientEvent::TerminalWrite(_) => ClientEventKind::TerminalWrite,
        }
    }

    /// Encode into the wire envelope.
    pub fn to_envelope(&self) -> Result<Envelope, ChannelError> {
        let data = match self {
            ClientEvent::FileChange(change) => serde_json::to_value(change)?,
            ClientEvent::TerminalWrite(data) => serde_json::Value::String(data.clone()),
        };
        Ok(Envelope {
            event: self.kind().wire_name().to_string(),
            data,
        })
    }

    /// Decode a typed event. Unknown names fail with `UnknownEvent`.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ChannelError> {
        match envelope.event.parse::<ClientEventKind>()? {
            ClientEventKind::FileChange => {
                Ok(ClientEvent::FileChange(serde_json::from_value(envelope.data)?))
            }
            ClientEventKind::TerminalWrite => {
                Ok(ClientEvent::TerminalWrite(serde_json::from_value(envelope.data)?))
            }
        }
    }
}

impl HostEvent {
    /// Build a `terminal:data` event.
    pub fn terminal_data(data: impl Into<String>) -> Self {
        HostEvent::TerminalData(TerminalOutput { data: data.into() })
    }

    /// Build a `file:refresh` event.
    pub fn file_refresh(path: Option<&str>) -> Self {
        HostEvent::FileRefresh(path.map(str::to_string))
    }

    /// Kind of this event.
    pub const fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::TerminalData(_) => HostEventKind::TerminalData,
            HostEvent::FileRefresh(_) => HostEventKind::FileRefresh,
        }
    }

    /// Encode into the wire envelope.
    pub fn to_envelope(&self) -> Result<Envelope, ChannelError> {
        let data = match self {
            HostEvent::TerminalData(output) => serde_json::to_value(output)?,
            HostEvent::FileRefresh(path) => serde_json::to_value(path)?,
        };
        Ok(Envelope {
            event: self.kind().wire_name().to_string(),
            data,
        })
    }

    /// Decode a typed event. Unknown names fail with `UnknownEvent`.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ChannelError> {
        match envelope.event.parse::<HostEventKind>()? {
            HostEventKind::TerminalData => {
                Ok(HostEvent::TerminalData(serde_json::from_value(envelope.data)?))
            }
            // Hosts send either the changed path or nothing at all
            HostEventKind::FileRefresh => match envelope.data {
                serde_json::Value::String(path) => Ok(HostEvent::FileRefresh(Some(path))),
                _ => Ok(HostEvent::FileRefresh(None)),
            },
        }
    }
}

// ============================================
// Wire envelope
// ============================================

/// One text frame on the wire: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire name of the event.
    pub event: String,
    /// Event payload, `null` when absent.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a text frame.
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================
// Connection State
// ============================================

/// Lifecycle of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in progress.
    Connecting,
    /// Frames can be sent.
    Connected,
    /// No connection and no attempt in progress.
    Disconnected,
    /// The last attempt failed; see `last_error`.
    Error,
}

/// Snapshot of a transport's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Incremented every time a connection is established.
    pub epoch: u64,
    /// Cleared when a connection is established.
    pub last_error: Option<String>,
    /// Failed attempts since the last successful connection.
    pub reconnect_attempts: u32,
}

impl ConnectionStatus {
    /// Status before the first connect.
    pub const fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            last_error: None,
            reconnect_attempts: 0,
        }
    }

    /// Whether frames can be sent.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_change_envelope_carries_path_and_content() {
        let envelope = ClientEvent::file_change("src/index.ts", "abc")
            .to_envelope()
            .unwrap();
        assert_eq!(envelope.event, "file:change");
        assert_eq!(envelope.data, json!({"path": "src/index.ts", "content": "abc"}));
    }

    #[test]
    fn terminal_data_decodes_from_object_payload() {
        let envelope = Envelope::decode(r#"{"event":"terminal:data","data":{"data":"ls\r\n"}}"#).unwrap();
        let event = HostEvent::from_envelope(envelope).unwrap();
        assert_eq!(event, HostEvent::terminal_data("ls\r\n"));
    }

    #[test]
    fn file_refresh_accepts_missing_payload() {
        let envelope = Envelope::decode(r#"{"event":"file:refresh"}"#).unwrap();
        assert_eq!(HostEvent::from_envelope(envelope).unwrap(), HostEvent::FileRefresh(None));

        let envelope = Envelope::decode(r#"{"event":"file:refresh","data":"src/a.ts"}"#).unwrap();
        assert_eq!(
            HostEvent::from_envelope(envelope).unwrap(),
            HostEvent::file_refresh(Some("src/a.ts"))
        );
    }

    #[test]
    fn unknown_event_names_are_rejected() {
        let envelope = Envelope::decode(r#"{"event":"termnial:data","data":{}}"#).unwrap();
        assert!(matches!(
            HostEvent::from_envelope(envelope),
            Err(ChannelError::UnknownEvent(name)) if name == "termnial:data"
        ));
    }

    #[test]
    fn outbound_names_are_not_inbound_kinds() {
        assert!("terminal:write".parse::<HostEventKind>().is_err());
        assert_eq!(
            "terminal:write".parse::<ClientEventKind>().unwrap(),
            ClientEventKind::TerminalWrite
        );
    }
}
