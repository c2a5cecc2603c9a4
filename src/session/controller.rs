// ABOUTME: Session controller coordinating tree, buffers and terminals
// Every state transition runs on the session loop; host round-trips post back as events

use crate::buffer::{EditBufferManager, OpenFile, PersistDue, PersistOutcome};
use crate::channel::{EventChannel, HostEventKind};
use crate::config::AppConfig;
use crate::host::{HostApi, HostError};
use crate::session::events::{SessionCommand, SessionEvent, SessionNotice};
use crate::terminal::{TerminalId, TerminalMultiplexer, TerminalSurface};
use crate::workspace::{TreeUpdate, WorkspaceTree};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Timing settings the session runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Inactivity delay before an edited file is persisted.
    pub persist_debounce: Duration,
    /// Upper bound on each host round-trip.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            persist_debounce: config.editor.persist_debounce(),
            request_timeout: config.host.request_timeout(),
        }
    }
}

/// Owns every piece of session state. Only the session loop mutates it.
pub struct SessionController {
    host: Arc<dyn HostApi>,
    channel: EventChannel,
    tree: WorkspaceTree,
    buffers: EditBufferManager,
    terminals: TerminalMultiplexer,
    active: Option<String>,
    /// Paths with a content fetch in flight, keyed to the open request that
    /// last asked for them
    pending_opens: HashMap<String, u64>,
    /// Sequence of the most recent user focus request
    focus_seq: u64,
    request_timeout: Duration,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    notices: Option<mpsc::UnboundedSender<SessionNotice>>,
}

impl SessionController {
    pub(crate) fn new(
        host: Arc<dyn HostApi>,
        mut channel: EventChannel,
        config: SessionConfig,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        due_tx: mpsc::UnboundedSender<PersistDue>,
    ) -> Self {
        // Payload is advisory; any refresh notice means a full re-fetch
        let refresh_tx = events_tx.clone();
        channel.on(HostEventKind::FileRefresh, move |_| {
            let _ = refresh_tx.send(SessionEvent::TreeInvalidated);
        });

        Self {
            host,
            channel,
            tree: WorkspaceTree::new(),
            buffers: EditBufferManager::new(config.persist_debounce, due_tx),
            terminals: TerminalMultiplexer::new(),
            active: None,
            pending_opens: HashMap::new(),
            focus_seq: 0,
            request_timeout: config.request_timeout,
            events_tx,
            notices: None,
        }
    }

    pub(crate) fn set_notices(&mut self, notices: mpsc::UnboundedSender<SessionNotice>) {
        self.notices = Some(notices);
    }

    /// Last-known workspace tree and its view state.
    pub const fn tree(&self) -> &WorkspaceTree {
        &self.tree
    }

    /// The event channel with its handler table.
    pub const fn channel(&self) -> &EventChannel {
        &self.channel
    }

    pub(crate) fn channel_mut(&mut self) -> &mut EventChannel {
        &mut self.channel
    }

    /// Mounted terminals.
    pub const fn terminals(&self) -> &TerminalMultiplexer {
        &self.terminals
    }

    /// Open files in tab order.
    pub fn open_files(&self) -> &[OpenFile] {
        self.buffers.files()
    }

    /// The open file at `path`, if any.
    pub fn open_file(&self, path: &str) -> Option<&OpenFile> {
        self.buffers.get(path)
    }

    /// Path of the focused tab.
    pub fn active_path(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The focused file, if any.
    pub fn active_file(&self) -> Option<&OpenFile> {
        self.active.as_deref().and_then(|path| self.buffers.get(path))
    }

    /// Whether a content fetch for `path` is in flight.
    pub fn is_opening(&self, path: &str) -> bool {
        self.pending_opens.contains_key(path)
    }

    /// Returns false once a shutdown has been requested.
    pub(crate) fn handle_command(&mut self, command: SessionCommand) -> bool {
        debug!("Session command: {:?}", command);
        match command {
            SessionCommand::Open(path) => self.open(&path),
            SessionCommand::Activate(path) => {
                self.activate(&path);
            }
            SessionCommand::Close(path) => {
                self.close(&path);
            }
            SessionCommand::Edit(content) => {
                self.edit(content);
            }
            SessionCommand::Save => {
                self.save();
            }
            SessionCommand::ToggleExpanded(path) => {
                self.tree.toggle_expanded(&path);
            }
            SessionCommand::SetSearchTerm(term) => self.tree.set_search_term(term),
            SessionCommand::RefreshTree => self.refresh_tree(),
            SessionCommand::MountTerminal { id, surface } => {
                self.mount_terminal(id, surface);
            }
            SessionCommand::UnmountTerminal(id) => {
                self.unmount_terminal(id);
            }
            SessionCommand::TerminalInput { id, data } => self.terminal_input(id, &data),
            SessionCommand::Shutdown => {
                info!("Session shutdown requested");
                return false;
            }
        }
        true
    }

    pub(crate) fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command(command) => return self.handle_command(command),
            SessionEvent::TreeInvalidated => {
                info!("Host reported a structure change; refreshing tree");
                self.refresh_tree();
            }
            SessionEvent::TreeFetched { ticket, result } => {
                match self.tree.apply_fetch(ticket, result) {
                    TreeUpdate::Applied => self.notify(SessionNotice::TreeUpdated),
                    TreeUpdate::Stale => {}
                    TreeUpdate::Failed(error) => self.notify(SessionNotice::TreeFetchFailed(error)),
                }
            }
            SessionEvent::ContentFetched { path, result } => self.finish_open(path, result),
        }
        true
    }

    pub(crate) fn handle_persist_due(&mut self, due: &PersistDue) {
        match self.buffers.fire(due, &self.channel) {
            PersistOutcome::Sent => self.notify(SessionNotice::Persisted {
                path: due.path.clone(),
            }),
            PersistOutcome::Dropped(reason) => self.notify(SessionNotice::PersistDropped {
                path: due.path.clone(),
                reason,
            }),
            PersistOutcome::Stale => {}
        }
    }

    /// Activate `path` if it is open, otherwise fetch it in the background.
    pub fn open(&mut self, path: &str) {
        let request = self.next_focus();

        if self.buffers.contains(path) {
            self.switch_to(path);
            return;
        }

        if let Some(pending) = self.pending_opens.get_mut(path) {
            debug!("Open of {} already in flight; request #{} takes over", path, request);
            *pending = request;
            return;
        }

        info!("Opening {} (request #{})", path, request);
        self.pending_opens.insert(path.to_string(), request);

        let host = Arc::clone(&self.host);
        let events_tx = self.events_tx.clone();
        let timeout = self.request_timeout;
        let path = path.to_string();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, host.fetch_content(&path)).await {
                Ok(result) => result,
                Err(_) => Err(HostError::HostUnreachable(format!(
                    "content request for {} timed out after {:?}",
                    path, timeout
                ))),
            };
            let _ = events_tx.send(SessionEvent::ContentFetched { path, result });
        });
    }

    fn finish_open(&mut self, path: String, result: Result<String, HostError>) {
        let Some(request) = self.pending_opens.remove(&path) else {
            debug!("Content for {} arrived with no open pending", path);
            return;
        };

        match result {
            Ok(content) => {
                self.buffers.insert(&path, content);
                if request == self.focus_seq {
                    self.switch_to(&path);
                } else {
                    debug!("{} opened in background; a newer request holds focus", path);
                }
                self.notify(SessionNotice::FileOpened { path });
            }
            Err(error) => {
                warn!("Failed to open {}: {}", path, error);
                self.notify(SessionNotice::FileOpenFailed { path, error });
            }
        }
    }

    /// Make an already open file active.
    pub fn activate(&mut self, path: &str) -> bool {
        if !self.buffers.contains(path) {
            debug!("Activate for {} which is not open", path);
            return false;
        }
        self.next_focus();
        self.switch_to(path);
        true
    }

    fn next_focus(&mut self) -> u64 {
        self.focus_seq += 1;
        self.focus_seq
    }

    fn switch_to(&mut self, path: &str) {
        if self.active.as_deref() == Some(path) {
            return;
        }
        if let Some(previous) = self.active.take() {
            // The unsent edit stays in memory, marked unsaved
            if self.buffers.cancel_pending(&previous) {
                info!("Left {} with a pending persist; edit kept unsaved", previous);
            }
        }
        debug!("Active file is now {}", path);
        self.active = Some(path.to_string());
    }

    /// Remove `path` and any unsent edit. Focus falls back to the first tab.
    pub fn close(&mut self, path: &str) -> bool {
        let Some(file) = self.buffers.remove(path) else {
            debug!("Close for {} which is not open", path);
            return false;
        };

        if self.active.as_deref() == Some(path) {
            self.active = self.buffers.first_path().map(str::to_string);
        }
        info!("Closed {}; active is now {:?}", path, self.active);
        self.notify(SessionNotice::FileClosed {
            path: path.to_string(),
            discarded_edits: file.is_dirty(),
        });
        true
    }

    /// Replace the active file's text and re-arm its persist timer.
    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        match self.active.clone() {
            Some(path) => self.buffers.edit(&path, content.into()),
            None => {
                debug!("Edit with no active file ignored");
                false
            }
        }
    }

    /// Persist the active file now, leaving any armed timer in place.
    pub fn save(&mut self) -> Option<PersistOutcome> {
        let path = self.active.clone()?;
        let outcome = self.buffers.save(&path, &self.channel)?;
        match &outcome {
            PersistOutcome::Sent => self.notify(SessionNotice::Persisted { path }),
            PersistOutcome::Dropped(reason) => self.notify(SessionNotice::PersistDropped {
                path,
                reason: reason.clone(),
            }),
            PersistOutcome::Stale => {}
        }
        Some(outcome)
    }

    /// Toggle a directory. Returns whether it is now expanded.
    pub fn toggle_expanded(&mut self, path: &str) -> bool {
        self.tree.toggle_expanded(path)
    }

    /// Filter visible rows by a case-insensitive substring.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.tree.set_search_term(term);
    }

    /// Start a background tree fetch. Older fetches still in flight become stale.
    pub fn refresh_tree(&mut self) {
        let ticket = self.tree.begin_fetch();
        let host = Arc::clone(&self.host);
        let events_tx = self.events_tx.clone();
        let timeout = self.request_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, host.fetch_tree()).await {
                Ok(result) => result,
                Err(_) => Err(HostError::HostUnreachable(format!(
                    "tree request timed out after {:?}",
                    timeout
                ))),
            };
            let _ = events_tx.send(SessionEvent::TreeFetched { ticket, result });
        });
    }

    /// Mount `surface` under `id` and bind it to terminal output.
    pub fn mount_terminal(&mut self, id: TerminalId, surface: impl TerminalSurface) -> bool {
        self.terminals.mount_with_id(&mut self.channel, id, surface)
    }

    /// Unbind and drop a surface. Returns false for unknown ids.
    pub fn unmount_terminal(&mut self, id: TerminalId) -> bool {
        self.terminals.unmount(&mut self.channel, id)
    }

    /// Forward input as `terminal:write`. Dropped while disconnected.
    pub fn terminal_input(&mut self, id: TerminalId, data: &str) {
        if let Err(e) = self.terminals.input(&self.channel, id, data) {
            debug!("Terminal input for {} not delivered: {}", id, e);
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(notice);
        }
    }
}
