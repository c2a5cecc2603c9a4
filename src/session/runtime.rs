// ABOUTME: Session loop draining commands, host events and timer firings
// The loop is the only owner of session state

use crate::buffer::PersistDue;
use crate::channel::{EventChannel, HostEvent, Transport};
use crate::host::HostApi;
use crate::session::controller::{SessionConfig, SessionController};
use crate::session::events::{SessionCommand, SessionEvent, SessionNotice};
use crate::terminal::{TerminalId, TerminalSurface};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// Quiet period after which [`Session::run_until_idle`] returns.
const IDLE_WINDOW: Duration = Duration::from_millis(50);

/// Single-owner loop over commands, host events and persist deadlines.
pub struct Session {
    controller: SessionController,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    host_rx: mpsc::UnboundedReceiver<HostEvent>,
    due_rx: mpsc::UnboundedReceiver<PersistDue>,
    stopped: bool,
}

impl Session {
    /// Build a session over `transport`, whose inbound events arrive on
    /// `host_events`. Issues the initial tree fetch, so it must be called
    /// inside a tokio runtime.
    pub fn new(
        host: Arc<dyn HostApi>,
        transport: Arc<dyn Transport>,
        host_events: mpsc::UnboundedReceiver<HostEvent>,
        config: SessionConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let channel = EventChannel::new(transport);
        let mut controller = SessionController::new(host, channel, config, events_tx.clone(), due_tx);
        controller.refresh_tree();
        info!("Session started (debounce {:?})", config.persist_debounce);

        Self {
            controller,
            events_tx,
            events_rx,
            host_rx: host_events,
            due_rx,
            stopped: false,
        }
    }

    /// A cloneable handle for sending commands.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.events_tx.clone(),
        }
    }

    /// Receive notices from now on. A later call replaces the earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.controller.set_notices(tx);
        rx
    }

    /// Read access to session state.
    pub const fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Mutable access for embedding code that drives the controller directly.
    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }

    /// Whether a shutdown was processed or every sender is gone.
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Wait for and process one message. Returns false once the session has
    /// stopped.
    pub async fn step(&mut self) -> bool {
        if self.stopped {
            return false;
        }

        tokio::select! {
            biased;

            Some(event) = self.events_rx.recv() => {
                if !self.controller.handle_event(event) {
                    self.stopped = true;
                }
            }
            // Persist deadlines are served before host traffic
            Some(due) = self.due_rx.recv() => {
                self.controller.handle_persist_due(&due);
            }
            Some(event) = self.host_rx.recv() => {
                let handled = self.controller.channel_mut().dispatch(&event);
                if handled == 0 {
                    debug!("No handler for {}", event.kind());
                }
            }
            else => {
                self.stopped = true;
            }
        }

        !self.stopped
    }

    /// Process messages until a shutdown command arrives.
    pub async fn run(mut self) {
        while self.step().await {}
        info!("Session loop finished");
    }

    /// Process messages for `duration`, then return.
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            tokio::select! {
                more = self.step() => {
                    if !more {
                        break;
                    }
                }
                () = tokio::time::sleep_until(deadline) => break,
            }
        }
    }

    /// Process messages until nothing arrives for a short quiet period.
    pub async fn run_until_idle(&mut self) {
        loop {
            tokio::select! {
                more = self.step() => {
                    if !more {
                        break;
                    }
                }
                () = tokio::time::sleep(IDLE_WINDOW) => break,
            }
        }
    }
}

/// Cloneable sender of commands into a running session. Each method returns
/// false once the session is gone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Queue any command.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(SessionEvent::Command(command)).is_ok()
    }

    /// Open `path` or focus it.
    pub fn open(&self, path: impl Into<String>) -> bool {
        self.send(SessionCommand::Open(path.into()))
    }

    /// Focus an open path.
    pub fn activate(&self, path: impl Into<String>) -> bool {
        self.send(SessionCommand::Activate(path.into()))
    }

    /// Close a tab.
    pub fn close(&self, path: impl Into<String>) -> bool {
        self.send(SessionCommand::Close(path.into()))
    }

    /// Replace the active file's text.
    pub fn edit(&self, content: impl Into<String>) -> bool {
        self.send(SessionCommand::Edit(content.into()))
    }

    /// Persist the active file now.
    pub fn save(&self) -> bool {
        self.send(SessionCommand::Save)
    }

    /// Expand or collapse a directory.
    pub fn toggle_expanded(&self, path: impl Into<String>) -> bool {
        self.send(SessionCommand::ToggleExpanded(path.into()))
    }

    /// Filter the tree rows.
    pub fn set_search_term(&self, term: impl Into<String>) -> bool {
        self.send(SessionCommand::SetSearchTerm(term.into()))
    }

    /// Re-fetch the tree.
    pub fn refresh_tree(&self) -> bool {
        self.send(SessionCommand::RefreshTree)
    }

    /// Mount `surface`; the id is usable immediately for input and unmount.
    pub fn mount_terminal(&self, surface: impl TerminalSurface) -> TerminalId {
        let id = TerminalId::new();
        self.send(SessionCommand::MountTerminal {
            id,
            surface: Box::new(surface),
        });
        id
    }

    /// Detach a surface.
    pub fn unmount_terminal(&self, id: TerminalId) -> bool {
        self.send(SessionCommand::UnmountTerminal(id))
    }

    /// Send keystrokes from a surface.
    pub fn terminal_input(&self, id: TerminalId, data: impl Into<String>) -> bool {
        self.send(SessionCommand::TerminalInput {
            id,
            data: data.into(),
        })
    }

    /// Stop the session loop.
    pub fn shutdown(&self) -> bool {
        self.send(SessionCommand::Shutdown)
    }
}
