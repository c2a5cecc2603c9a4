// ABOUTME: Typed emit/subscribe facade over a single host transport
// Owns the per-instance dispatch table that routes inbound host events to handlers

use crate::channel::error::ChannelError;
use crate::channel::protocol::{ClientEvent, ConnectionStatus, HostEvent, HostEventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A live, message-oriented connection to the session host.
///
/// Implementations deliver inbound events through the receiver they hand out
/// at construction; `send` only ever queues on the current connection.
pub trait Transport: Send + Sync {
    /// Queue an event for the host. Fails with `ChannelDropped` when no
    /// connection is live.
    fn send(&self, event: &ClientEvent) -> Result<(), ChannelError>;

    /// Current connection snapshot.
    fn status(&self) -> ConnectionStatus;
}

/// Callback invoked for every inbound event of the kind it was registered for.
pub type Handler = Box<dyn FnMut(&HostEvent) + Send>;

/// Identifies one registration in an [`EventChannel`] dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    handler: Handler,
}

/// Typed emit/subscribe facade over one transport.
///
/// Handlers survive reconnects. Each instance has its own table, so two
/// channels never see each other's registrations.
pub struct EventChannel {
    transport: Arc<dyn Transport>,
    handlers: HashMap<HostEventKind, Vec<Registration>>,
    next_handler_id: u64,
}

impl EventChannel {
    /// Wrap `transport` with an empty handler table.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            handlers: HashMap::new(),
            next_handler_id: 1,
        }
    }

    /// Best-effort send. A failure is reported but never retried.
    pub fn emit(&self, event: ClientEvent) -> Result<(), ChannelError> {
        let kind = event.kind();
        match self.transport.send(&event) {
            Ok(()) => {
                debug!("Emitted {}", kind);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to emit {}: {}", kind, e);
                Err(e)
            }
        }
    }

    /// Register a handler for every host message of `kind`, in host send order.
    pub fn on<F>(&mut self, kind: HostEventKind, handler: F) -> HandlerId
    where
        F: FnMut(&HostEvent) + Send + 'static,
    {
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.entry(kind).or_default().push(Registration {
            id,
            handler: Box::new(handler),
        });
        debug!("Registered handler {:?} for {}", id, kind);
        id
    }

    /// Remove every registration for `kind`. Returns how many were removed.
    pub fn off(&mut self, kind: HostEventKind) -> usize {
        let removed = self.handlers.remove(&kind).map_or(0, |regs| regs.len());
        debug!("Removed {} handler(s) for {}", removed, kind);
        removed
    }

    /// Remove a single registration. Removing an unknown id is a no-op.
    pub fn off_handler(&mut self, id: HandlerId) -> bool {
        for regs in self.handlers.values_mut() {
            if let Some(pos) = regs.iter().position(|reg| reg.id == id) {
                regs.remove(pos);
                debug!("Removed handler {:?}", id);
                return true;
            }
        }
        false
    }

    /// Deliver one inbound event to the handlers of its kind in registration
    /// order. Returns the number of handlers invoked.
    pub fn dispatch(&mut self, event: &HostEvent) -> usize {
        let kind = event.kind();
        match self.handlers.get_mut(&kind) {
            Some(regs) if !regs.is_empty() => {
                for reg in regs.iter_mut() {
                    (reg.handler)(event);
                }
                regs.len()
            }
            _ => {
                debug!("No handler for {}, dropping event", kind);
                0
            }
        }
    }

    /// Handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: HostEventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Connection status of the underlying transport.
    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Whether the transport is connected right now.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<HostEventKind, usize> = self
            .handlers
            .iter()
            .map(|(kind, regs)| (*kind, regs.len()))
            .collect();
        f.debug_struct("EventChannel")
            .field("status", &self.transport.status())
            .field("handlers", &counts)
            .finish_non_exhaustive()
    }
}
