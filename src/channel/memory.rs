// ABOUTME: In-process transport pair for embedding and tests
// The host half pushes events, records what the client sent, and can simulate drops

use crate::channel::error::ChannelError;
use crate::channel::event_channel::Transport;
use crate::channel::protocol::{ClientEvent, ConnectionState, ConnectionStatus, HostEvent};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

/// A client event as observed by the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEvent {
    /// Clock reading when the client sent it.
    pub at: Instant,
    /// Connection epoch the event was sent in.
    pub epoch: u64,
    /// The event itself.
    pub event: ClientEvent,
}

/// Client half, handed to an [`EventChannel`](crate::channel::EventChannel).
pub struct MemoryTransport {
    status: watch::Receiver<ConnectionStatus>,
    outbound: mpsc::UnboundedSender<SentEvent>,
}

/// Host half, kept by the test or embedding code.
pub struct MemoryHost {
    status: watch::Sender<ConnectionStatus>,
    outbound: mpsc::UnboundedReceiver<SentEvent>,
    inbound: mpsc::UnboundedSender<HostEvent>,
}

impl MemoryTransport {
    /// Create a connected pair (epoch 1) plus the receiver of inbound host events.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<HostEvent>, MemoryHost) {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus {
            state: ConnectionState::Connected,
            epoch: 1,
            last_error: None,
            reconnect_attempts: 0,
        });
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            status: status_rx,
            outbound: outbound_tx,
        };
        let host = MemoryHost {
            status: status_tx,
            outbound: outbound_rx,
            inbound: inbound_tx,
        };
        (transport, inbound_rx, host)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, event: &ClientEvent) -> Result<(), ChannelError> {
        let status = self.status.borrow().clone();
        if !status.is_connected() {
            return Err(ChannelError::ChannelDropped(format!(
                "{} while {:?}",
                event.kind(),
                status.state
            )));
        }
        self.outbound
            .send(SentEvent {
                at: Instant::now(),
                epoch: status.epoch,
                event: event.clone(),
            })
            .map_err(|_| ChannelError::ChannelDropped("memory host closed".to_string()))
    }

    fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }
}

impl MemoryHost {
    /// Push an event to the client. Events pushed while disconnected are lost.
    pub fn push(&self, event: HostEvent) -> bool {
        if !self.status.borrow().is_connected() {
            debug!("Memory host dropping {} while disconnected", event.kind());
            return false;
        }
        self.inbound.send(event).is_ok()
    }

    /// Drain every event the client has sent so far.
    pub fn take_sent(&mut self) -> Vec<SentEvent> {
        let mut sent = Vec::new();
        while let Ok(event) = self.outbound.try_recv() {
            sent.push(event);
        }
        sent
    }

    /// Wait for the next event the client sends.
    pub async fn next_sent(&mut self) -> Option<SentEvent> {
        self.outbound.recv().await
    }

    /// Drop the connection. Sends fail until [`Self::reconnect`].
    pub fn disconnect(&self) {
        self.status.send_modify(|status| {
            status.state = ConnectionState::Disconnected;
        });
    }

    /// Start a new connection epoch.
    pub fn reconnect(&self) {
        self.status.send_modify(|status| {
            status.state = ConnectionState::Connected;
            status.epoch += 1;
            status.last_error = None;
        });
    }

    /// Connection status as the client sees it.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }
}
