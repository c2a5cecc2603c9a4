// ABOUTME: Binds terminal surfaces to the shell sub-stream of the event channel
// terminal:data goes to mounted surfaces, surface input goes out as terminal:write

use crate::channel::{ChannelError, ClientEvent, EventChannel, HandlerId, HostEvent, HostEventKind};
use crate::terminal::surface::TerminalSurface;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifies a mounted terminal surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalId(Uuid);

impl TerminalId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TerminalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One mounted terminal surface and its channel binding.
pub struct TerminalSession {
    id: TerminalId,
    /// Held until first attach, then owned by the output handler
    surface: Option<Box<dyn TerminalSurface>>,
    binding: Option<HandlerId>,
}

impl TerminalSession {
    /// Wrap `surface` under a fresh id.
    pub fn new(surface: impl TerminalSurface) -> Self {
        Self::with_id(TerminalId::new(), surface)
    }

    /// Wrap `surface` under `id`.
    pub fn with_id(id: TerminalId, surface: impl TerminalSurface) -> Self {
        Self {
            id,
            surface: Some(Box::new(surface)),
            binding: None,
        }
    }

    /// Id this surface is mounted under.
    pub const fn id(&self) -> TerminalId {
        self.id
    }

    /// Whether output is currently routed to the surface.
    pub const fn is_attached(&self) -> bool {
        self.binding.is_some()
    }

    /// Route `terminal:data` to the surface. Returns false when already
    /// attached or when the surface has been torn down.
    pub fn attach(&mut self, channel: &mut EventChannel) -> bool {
        if self.binding.is_some() {
            debug!("Terminal {} already attached", self.id);
            return false;
        }
        let Some(mut surface) = self.surface.take() else {
            debug!("Terminal {} was torn down; not reattaching", self.id);
            return false;
        };

        let handler = channel.on(HostEventKind::TerminalData, move |event| {
            if let HostEvent::TerminalData(output) = event {
                surface.write(&output.data);
            }
        });
        self.binding = Some(handler);
        info!("Terminal {} attached", self.id);
        true
    }

    /// Forward surface input to the host shell.
    pub fn input(&self, channel: &EventChannel, data: &str) -> Result<(), ChannelError> {
        if self.binding.is_none() {
            debug!("Dropping input for detached terminal {}", self.id);
            return Ok(());
        }
        channel.emit(ClientEvent::terminal_write(data))
    }

    /// Unregister this session's handler. Safe to call repeatedly.
    pub fn teardown(&mut self, channel: &mut EventChannel) -> bool {
        match self.binding.take() {
            Some(handler) => {
                channel.off_handler(handler);
                info!("Terminal {} detached", self.id);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalSession")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// All terminal surfaces mounted in one session.
#[derive(Debug, Default)]
pub struct TerminalMultiplexer {
    sessions: HashMap<TerminalId, TerminalSession>,
}

impl TerminalMultiplexer {
    /// An empty multiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a surface and attach it to the channel.
    pub fn mount(&mut self, channel: &mut EventChannel, surface: impl TerminalSurface) -> TerminalId {
        let id = TerminalId::new();
        self.mount_with_id(channel, id, surface);
        id
    }

    /// Mount under a caller-chosen id. Mounting an id twice keeps the first
    /// surface and its binding.
    pub fn mount_with_id(
        &mut self,
        channel: &mut EventChannel,
        id: TerminalId,
        surface: impl TerminalSurface,
    ) -> bool {
        if let Some(existing) = self.sessions.get_mut(&id) {
            debug!("Terminal {} already mounted", id);
            existing.attach(channel);
            return false;
        }
        let mut session = TerminalSession::with_id(id, surface);
        session.attach(channel);
        self.sessions.insert(id, session);
        true
    }

    /// Re-run attach for an existing surface; a no-op when already bound.
    pub fn remount(&mut self, channel: &mut EventChannel, id: TerminalId) -> bool {
        self.sessions
            .get_mut(&id)
            .is_some_and(|session| session.attach(channel))
    }

    /// Tear down and forget a surface. Unknown ids return false.
    pub fn unmount(&mut self, channel: &mut EventChannel, id: TerminalId) -> bool {
        match self.sessions.remove(&id) {
            Some(mut session) => {
                session.teardown(channel);
                true
            }
            None => false,
        }
    }

    /// Forward input from a mounted surface. Unknown ids are ignored.
    pub fn input(&self, channel: &EventChannel, id: TerminalId, data: &str) -> Result<(), ChannelError> {
        match self.sessions.get(&id) {
            Some(session) => session.input(channel, data),
            None => {
                debug!("Input for unknown terminal {}", id);
                Ok(())
            }
        }
    }

    /// The session mounted under `id`.
    pub fn get(&self, id: TerminalId) -> Option<&TerminalSession> {
        self.sessions.get(&id)
    }

    /// Number of mounted surfaces.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryTransport;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn channel() -> (EventChannel, crate::channel::MemoryHost) {
        let (transport, _inbound, host) = MemoryTransport::pair();
        (EventChannel::new(Arc::new(transport)), host)
    }

    #[test]
    fn attach_is_idempotent() {
        let (mut channel, _host) = channel();
        let (tx, _rx) = mpsc::unbounded_channel::<String>();
        let mut session = TerminalSession::new(tx);

        assert!(session.attach(&mut channel));
        assert!(!session.attach(&mut channel));
        assert_eq!(channel.handler_count(HostEventKind::TerminalData), 1);
    }

    #[test]
    fn output_reaches_surface_in_order() {
        let (mut channel, _host) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut session = TerminalSession::new(tx);
        session.attach(&mut channel);

        channel.dispatch(&HostEvent::terminal_data("$ "));
        channel.dispatch(&HostEvent::terminal_data("ls\r\n"));

        assert_eq!(rx.try_recv().unwrap(), "$ ");
        assert_eq!(rx.try_recv().unwrap(), "ls\r\n");
    }

    #[test]
    fn teardown_stops_output_and_is_idempotent() {
        let (mut channel, _host) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut session = TerminalSession::new(tx);
        session.attach(&mut channel);

        assert!(session.teardown(&mut channel));
        assert!(!session.teardown(&mut channel));
        assert_eq!(channel.dispatch(&HostEvent::terminal_data("late")), 0);
        assert!(rx.try_recv().is_err());
        assert!(!session.attach(&mut channel));
    }

    #[test]
    fn teardown_leaves_other_surfaces_bound() {
        let (mut channel, _host) = channel();
        let mut terminals = TerminalMultiplexer::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel::<String>();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel::<String>();
        let a = terminals.mount(&mut channel, tx_a);
        terminals.mount(&mut channel, tx_b);

        assert!(terminals.unmount(&mut channel, a));
        channel.dispatch(&HostEvent::terminal_data("still here"));
        assert_eq!(rx_b.try_recv().unwrap(), "still here");
    }

    #[test]
    fn input_is_forwarded_only_while_attached() {
        let (mut channel, mut host) = channel();
        let (tx, _rx) = mpsc::unbounded_channel::<String>();
        let mut session = TerminalSession::new(tx);

        session.input(&channel, "ignored").unwrap();
        session.attach(&mut channel);
        session.input(&channel, "pwd\r").unwrap();

        let sent: Vec<ClientEvent> = host.take_sent().into_iter().map(|sent| sent.event).collect();
        assert_eq!(sent, vec![ClientEvent::terminal_write("pwd\r")]);
    }
}
