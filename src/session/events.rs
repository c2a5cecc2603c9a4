// ABOUTME: Messages flowing into and out of the session loop
// Commands come from front-ends, notices go back out to them

use crate::host::HostError;
use crate::terminal::{TerminalId, TerminalSurface};
use crate::workspace::{FetchTicket, WorkspaceNode};
use std::fmt;

/// User intents accepted by the session loop.
pub enum SessionCommand {
    /// Open a path, or focus it if already open.
    Open(String),
    /// Focus an already open path.
    Activate(String),
    /// Close a tab. Pending edits are discarded.
    Close(String),
    /// Full replacement text for the active file.
    Edit(String),
    /// Persist the active file now.
    Save,
    /// Expand or collapse a directory.
    ToggleExpanded(String),
    /// Filter the tree rows.
    SetSearchTerm(String),
    /// Re-fetch the whole tree.
    RefreshTree,
    /// Attach a surface to terminal output.
    MountTerminal {
        /// Id the surface is mounted under.
        id: TerminalId,
        /// Output sink.
        surface: Box<dyn TerminalSurface>,
    },
    /// Detach a surface.
    UnmountTerminal(TerminalId),
    /// Keystrokes from a surface.
    TerminalInput {
        /// Surface the input came from.
        id: TerminalId,
        /// Raw input.
        data: String,
    },
    /// Stop the session loop.
    Shutdown,
}

impl fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(path) => f.debug_tuple("Open").field(path).finish(),
            Self::Activate(path) => f.debug_tuple("Activate").field(path).finish(),
            Self::Close(path) => f.debug_tuple("Close").field(path).finish(),
            Self::Edit(content) => f.debug_tuple("Edit").field(&content.len()).finish(),
            Self::Save => write!(f, "Save"),
            Self::ToggleExpanded(path) => f.debug_tuple("ToggleExpanded").field(path).finish(),
            Self::SetSearchTerm(term) => f.debug_tuple("SetSearchTerm").field(term).finish(),
            Self::RefreshTree => write!(f, "RefreshTree"),
            Self::MountTerminal { id, .. } => f.debug_struct("MountTerminal").field("id", id).finish(),
            Self::UnmountTerminal(id) => f.debug_tuple("UnmountTerminal").field(id).finish(),
            Self::TerminalInput { id, data } => f
                .debug_struct("TerminalInput")
                .field("id", id)
                .field("bytes", &data.len())
                .finish(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Everything the loop reacts to besides inbound host events and timer firings.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Command(SessionCommand),
    /// The host announced a structure change.
    TreeInvalidated,
    TreeFetched {
        ticket: FetchTicket,
        result: Result<WorkspaceNode, HostError>,
    },
    ContentFetched {
        path: String,
        result: Result<String, HostError>,
    },
}

/// Observable outcomes reported to front-ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// A fetched tree replaced the displayed one.
    TreeUpdated,
    /// The previous tree is still shown.
    TreeFetchFailed(HostError),
    /// A file finished loading and has a tab.
    FileOpened { path: String },
    /// Loading a file failed; no tab was created.
    FileOpenFailed { path: String, error: HostError },
    /// `discarded_edits` is set when unsaved text was thrown away.
    FileClosed { path: String, discarded_edits: bool },
    /// The file's content was handed to the channel.
    Persisted { path: String },
    /// The channel was down; the file stays unsaved.
    PersistDropped { path: String, reason: String },
}
