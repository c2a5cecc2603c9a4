// ABOUTME: WebSocket transport for the host event channel
// Manages connection lifecycle, epochs, keepalive pings, and reconnection

use crate::channel::error::ChannelError;
use crate::channel::event_channel::Transport;
use crate::channel::protocol::{
    ClientEvent, ConnectionState, ConnectionStatus, Envelope, HostEvent,
};
use crate::config::ChannelConfig;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, error, info, warn};

/// An encoded frame tagged with the epoch it was queued in.
#[derive(Debug)]
struct Outbound {
    epoch: u64,
    text: String,
}

/// [`Transport`] over a WebSocket, with reconnection.
///
/// Each established connection is a new epoch. Frames queued in an earlier
/// epoch are discarded rather than replayed.
pub struct WebSocketTransport {
    /// WebSocket URL of the session host
    url: String,

    /// Current connection status
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,

    /// Frames waiting for the connection loop
    tx_sender: mpsc::UnboundedSender<Outbound>,
    tx_receiver: Arc<Mutex<mpsc::UnboundedReceiver<Outbound>>>,

    /// Decoded host events
    rx_sender: mpsc::UnboundedSender<HostEvent>,

    /// Reconnection configuration
    connect_timeout: Duration,
    reconnect_interval: Duration,
    max_reconnect_attempts: u32,
    ping_interval: Duration,

    /// Task handle for the connection loop
    connection_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Create a transport and the receiver that yields inbound host events.
    pub fn new(
        url: impl Into<String>,
        config: &ChannelConfig,
    ) -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::disconnected());
        let (tx_sender, tx_receiver) = mpsc::unbounded_channel();
        let (rx_sender, rx_receiver) = mpsc::unbounded_channel();

        let transport = Self {
            url: url.into(),
            status_tx: Arc::new(status_tx),
            status_rx,
            tx_sender,
            tx_receiver: Arc::new(Mutex::new(tx_receiver)),
            rx_sender,
            connect_timeout: config.connect_timeout(),
            reconnect_interval: config.reconnect_interval(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            ping_interval: config.ping_interval(),
            connection_handle: Mutex::new(None),
        };
        (transport, rx_receiver)
    }

    /// Host URL this transport connects to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection loop and wait for the first connection.
    ///
    /// Fails with `ConnectionFailed` as soon as the first attempt fails. The
    /// loop keeps retrying in the background until `disconnect` or the
    /// attempt cap stops it.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        info!("Starting WebSocket connection to {}", self.url);

        {
            let mut connection_handle = self.connection_handle.lock().await;
            let running = connection_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished());
            if running {
                debug!("Connection loop already running");
            } else {
                self.status_tx.send_modify(|status| {
                    status.state = ConnectionState::Connecting;
                    status.reconnect_attempts = 0;
                    status.last_error = None;
                });
                *connection_handle = Some(self.spawn_connection_loop());
                info!("Connection loop task spawned");
            }
        }

        // The loop moves past Error immediately, so a failed attempt is
        // recognised by the error it leaves behind.
        let mut status_rx = self.status_rx.clone();
        let wait = status_rx.wait_for(|status| status.is_connected() || status.last_error.is_some());
        let outcome = tokio::time::timeout(self.connect_timeout, wait)
            .await
            .map(|waited| waited.map(|status| status.clone()));

        match outcome {
            Ok(Ok(status)) if status.is_connected() => {
                info!("WebSocket connected (epoch {})", status.epoch);
                Ok(())
            }
            Ok(Ok(status)) => {
                let reason = status
                    .last_error
                    .unwrap_or_else(|| "unknown error".to_string());
                error!("Connection failed: {}", reason);
                Err(ChannelError::ConnectionFailed(reason))
            }
            Ok(Err(_)) => Err(ChannelError::ConnectionFailed(
                "status channel closed".to_string(),
            )),
            Err(_) => {
                error!("WebSocket connection timeout after {:?}", self.connect_timeout);
                Err(ChannelError::ConnectTimeout(self.connect_timeout))
            }
        }
    }

    /// Spawn the connection loop that handles WebSocket lifecycle
    fn spawn_connection_loop(&self) -> tokio::task::JoinHandle<()> {
        let url = self.url.clone();
        let status = self.status_tx.clone();
        let tx_receiver = self.tx_receiver.clone();
        let rx_sender = self.rx_sender.clone();
        let reconnect_interval = self.reconnect_interval;
        let max_reconnect_attempts = self.max_reconnect_attempts;
        let ping_interval = self.ping_interval;

        tokio::spawn(async move {
            loop {
                match Self::connection_handler(
                    &url,
                    &status,
                    tx_receiver.clone(),
                    rx_sender.clone(),
                    ping_interval,
                )
                .await
                {
                    Ok(()) => info!("WebSocket connection closed"),
                    Err(e) => {
                        error!("WebSocket connection error: {}", e);
                        status.send_modify(|s| {
                            s.state = ConnectionState::Error;
                            s.last_error = Some(e.to_string());
                        });
                    }
                }

                if rx_sender.is_closed() {
                    info!("Event receiver dropped, stopping connection loop");
                    status.send_modify(|s| s.state = ConnectionState::Disconnected);
                    break;
                }

                let mut should_reconnect = false;
                status.send_modify(|s| {
                    if s.reconnect_attempts >= max_reconnect_attempts {
                        warn!("Max reconnection attempts reached");
                        s.state = ConnectionState::Disconnected;
                    } else {
                        s.reconnect_attempts += 1;
                        s.state = ConnectionState::Connecting;
                        should_reconnect = true;
                    }
                });

                if !should_reconnect {
                    break;
                }

                sleep(reconnect_interval).await;
                info!("Attempting to reconnect...");
            }
        })
    }

    /// Handle a single WebSocket connection, which is one epoch.
    async fn connection_handler(
        url: &str,
        status: &watch::Sender<ConnectionStatus>,
        tx_receiver: Arc<Mutex<mpsc::UnboundedReceiver<Outbound>>>,
        rx_sender: mpsc::UnboundedSender<HostEvent>,
        ping_interval: Duration,
    ) -> Result<(), ChannelError> {
        debug!("Attempting WebSocket handshake with {}", url);

        let (ws_stream, response) = connect_async(url).await.map_err(|e| {
            let reason = e.to_string();
            if reason.contains("refused") {
                error!("Connection refused - is the session host running?");
            }
            ChannelError::ConnectionFailed(reason)
        })?;
        debug!("WebSocket response status: {:?}", response.status());

        let mut epoch = 0;
        status.send_modify(|s| {
            s.epoch += 1;
            s.state = ConnectionState::Connected;
            s.last_error = None;
            s.reconnect_attempts = 0;
            epoch = s.epoch;
        });
        info!("WebSocket connected to {} (epoch {})", url, epoch);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // Outgoing frames, including keepalive pings
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<tungstenite::Message>();

        let send_task = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
        });

        let ping_tx = outgoing_tx.clone();
        let ping_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ping_interval);
            ticker.tick().await; // Skip first immediate tick
            loop {
                ticker.tick().await;
                if ping_tx.send(tungstenite::Message::Ping(Vec::new())).is_err() {
                    break;
                }
                debug!("Ping sent");
            }
        });

        let mut tx_guard = tx_receiver.lock().await;

        let result = loop {
            tokio::select! {
                Some(outbound) = tx_guard.recv() => {
                    if outbound.epoch != epoch {
                        debug!("Discarding frame queued in epoch {} (now {})", outbound.epoch, epoch);
                        continue;
                    }
                    if outgoing_tx.send(tungstenite::Message::Text(outbound.text)).is_err() {
                        error!("Failed to queue outgoing message");
                        break Ok(());
                    }
                }

                Some(ws_msg) = ws_receiver.next() => {
                    match ws_msg {
                        Ok(tungstenite::Message::Text(text)) => {
                            match Envelope::decode(&text).and_then(HostEvent::from_envelope) {
                                Ok(event) => {
                                    debug!("Received {}", event.kind());
                                    if let Err(e) = rx_sender.send(event) {
                                        warn!("Failed to forward host event: {}", e);
                                        break Ok(());
                                    }
                                }
                                Err(e) => warn!("Skipping host frame: {}", e),
                            }
                        }
                        Ok(tungstenite::Message::Close(_)) => {
                            info!("WebSocket closed by host");
                            break Ok(());
                        }
                        Ok(_) => {
                            // Binary, Ping, Pong and raw frames carry no events
                        }
                        Err(e) => {
                            error!("WebSocket error: {}", e);
                            break Err(ChannelError::ConnectionFailed(e.to_string()));
                        }
                    }
                }

                else => {
                    info!("Channels closed, ending connection");
                    break Ok(());
                }
            }
        };

        ping_handle.abort();
        send_task.abort();

        status.send_modify(|s| s.state = ConnectionState::Disconnected);

        result
    }

    /// Stop the connection loop. Queued frames are discarded with the epoch.
    pub async fn disconnect(&self) {
        info!("Disconnecting WebSocket transport");

        if let Some(handle) = self.connection_handle.lock().await.take() {
            handle.abort();
        }
        self.status_tx
            .send_modify(|s| s.state = ConnectionState::Disconnected);
    }

    /// Subscribe to connection status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, event: &ClientEvent) -> Result<(), ChannelError> {
        let status = self.status_rx.borrow().clone();
        if !status.is_connected() {
            return Err(ChannelError::ChannelDropped(format!(
                "{} while {:?}",
                event.kind(),
                status.state
            )));
        }

        let text = event.to_envelope()?.encode()?;
        self.tx_sender
            .send(Outbound {
                epoch: status.epoch,
                text,
            })
            .map_err(|e| ChannelError::ChannelDropped(e.to_string()))
    }

    fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::protocol::ClientEvent;

    #[tokio::test]
    async fn send_before_connect_is_dropped() {
        let (transport, _events) =
            WebSocketTransport::new("ws://127.0.0.1:9/socket", &ChannelConfig::default());
        let result = transport.send(&ClientEvent::terminal_write("ls\n"));
        assert!(matches!(result, Err(ChannelError::ChannelDropped(_))));
        assert_eq!(transport.status().state, ConnectionState::Disconnected);
    }

    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{}/socket", addr)
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails_fast() {
        let config = ChannelConfig {
            connect_timeout_ms: 3_000,
            reconnect_interval_ms: 50,
            max_reconnect_attempts: 0,
            ..ChannelConfig::default()
        };
        let (transport, _events) = WebSocketTransport::new(closed_port_url().await, &config);

        let started = std::time::Instant::now();
        let err = transport.connect().await.unwrap_err();

        assert!(matches!(err, ChannelError::ConnectionFailed(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
        transport.disconnect().await;
        assert!(!transport.status().is_connected());
    }

    #[tokio::test]
    async fn connect_reports_failure_while_retrying() {
        let config = ChannelConfig {
            connect_timeout_ms: 3_000,
            reconnect_interval_ms: 50,
            max_reconnect_attempts: 5,
            ..ChannelConfig::default()
        };
        let (transport, _events) = WebSocketTransport::new(closed_port_url().await, &config);

        let started = std::time::Instant::now();
        let err = transport.connect().await.unwrap_err();

        assert!(matches!(err, ChannelError::ConnectionFailed(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
        transport.disconnect().await;
    }

    #[tokio::test]
    async fn frames_from_an_older_epoch_are_not_sent() {
        use tokio_tungstenite::tungstenite::Message;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut first = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = first.close(None).await;
            drop(first);

            let (stream, _) = listener.accept().await.unwrap();
            let mut second = tokio_tungstenite::accept_async(stream).await.unwrap();
            second
                .send(Message::Text(
                    serde_json::json!({"event": "terminal:data", "data": {"data": "back"}})
                        .to_string(),
                ))
                .await
                .unwrap();
            loop {
                match second.next().await {
                    Some(Ok(Message::Text(text))) => return Envelope::decode(&text).unwrap(),
                    Some(Ok(_)) => continue,
                    other => panic!("socket ended early: {other:?}"),
                }
            }
        });

        let config = ChannelConfig {
            connect_timeout_ms: 2_000,
            reconnect_interval_ms: 50,
            ..ChannelConfig::default()
        };
        let (transport, mut events) =
            WebSocketTransport::new(format!("ws://{}", addr), &config);
        transport.connect().await.unwrap();

        let resumed = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap();
        assert_eq!(resumed, Some(HostEvent::terminal_data("back")));
        assert_eq!(transport.status().epoch, 2);

        let stale = ClientEvent::terminal_write("stale").to_envelope().unwrap();
        transport
            .tx_sender
            .send(Outbound {
                epoch: 1,
                text: stale.encode().unwrap(),
            })
            .unwrap();
        transport
            .send(&ClientEvent::terminal_write("fresh"))
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event, "terminal:write");
        assert_eq!(received.data, serde_json::json!("fresh"));

        transport.disconnect().await;
    }
}
