//! Duplex channel lifecycle
//!
//! One logical connection to the transcription backend. States move
//! `Idle -> Connecting -> Open -> Closed` and every close or error
//! schedules exactly one reconnect after a fixed delay; the retry loop
//! runs forever with no backoff, acceptable because the channel is used
//! interactively. All transitions go through `reduce()`, which returns
//! the next state and the action the driver must execute.
//!
//! Sends are only accepted while `Open`; anything else is dropped with a
//! warning rather than queued. The reconnect timer is owned by the
//! session and cancelled on shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{AudioEnvelope, InboundMessage};

/// Fixed delay before re-entering `Connecting` after a close or error.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Timeout for the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound envelopes buffered between `try_send` and the socket write.
const OUTBOUND_QUEUE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ConnectRequested,
    TransportOpened,
    TransportClosed,
    TransportErrored,
    RetryElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    OpenTransport,
    ScheduleRetry,
}

/// Pure lifecycle reducer. A connect request while `Open` is a no-op (at
/// most one live socket); a close or error from a live or pending
/// transport schedules exactly one retry.
pub fn reduce(
    state: ChannelState,
    event: LifecycleEvent,
) -> (ChannelState, Option<LifecycleAction>) {
    use ChannelState::*;
    use LifecycleAction::*;
    use LifecycleEvent::*;

    match (state, event) {
        (Open, ConnectRequested) => (Open, None),
        (_, ConnectRequested) => (Connecting, Some(OpenTransport)),
        (Connecting, TransportOpened) => (Open, None),
        (Connecting | Open, TransportClosed | TransportErrored) => (Closed, Some(ScheduleRetry)),
        (Closed, RetryElapsed) => (Connecting, Some(OpenTransport)),
        // Stale events (a late close from a discarded transport, a timer
        // firing after an explicit connect) change nothing.
        (state, _) => (state, None),
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: RECONNECT_DELAY,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Cloneable sender side of a channel session.
#[derive(Clone)]
pub struct ChannelHandle {
    outbound_tx: mpsc::Sender<AudioEnvelope>,
    state_rx: watch::Receiver<ChannelState>,
    connect_notify: Arc<Notify>,
}

impl ChannelHandle {
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Watch for state changes (used to await `Open`).
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Request a connect. No-op while the channel is already open;
    /// otherwise any pending retry delay is cut short.
    pub fn connect(&self) {
        if self.state() == ChannelState::Open {
            debug!("Channel already open, ignoring connect request");
            return;
        }
        self.connect_notify.notify_one();
    }

    /// Hand an envelope to the transport. Only permitted while `Open`;
    /// otherwise the envelope is dropped, not queued.
    pub fn try_send(&self, envelope: AudioEnvelope) -> bool {
        if self.state() != ChannelState::Open {
            warn!("Channel not open, dropping audio envelope");
            return false;
        }
        match self.outbound_tx.try_send(envelope) {
            Ok(()) => true,
            Err(_) => {
                warn!("Outbound queue unavailable, dropping audio envelope");
                false
            }
        }
    }
}

/// A spawned channel session. Connects immediately and keeps reconnecting
/// until `shutdown()`.
pub struct ChannelSession {
    handle: ChannelHandle,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ChannelSession {
    /// Spawn the session. Inbound messages are forwarded to `inbound_tx`
    /// in arrival order.
    pub fn spawn(config: ChannelConfig, inbound_tx: mpsc::Sender<InboundMessage>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);
        let connect_notify = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run(
            config,
            state_tx,
            outbound_rx,
            inbound_tx,
            connect_notify.clone(),
            shutdown.clone(),
        ));

        Self {
            handle: ChannelHandle {
                outbound_tx,
                state_rx,
                connect_notify,
            },
            shutdown,
            task,
        }
    }

    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    /// Tear the session down, cancelling any pending reconnect timer.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            debug!("Channel task ended abnormally: {}", e);
        }
    }
}

struct Driver {
    config: ChannelConfig,
    state: ChannelState,
    state_tx: watch::Sender<ChannelState>,
    outbound_rx: mpsc::Receiver<AudioEnvelope>,
    outbound_open: bool,
    inbound_tx: mpsc::Sender<InboundMessage>,
    connect_notify: Arc<Notify>,
    shutdown: CancellationToken,
}

async fn run(
    config: ChannelConfig,
    state_tx: watch::Sender<ChannelState>,
    outbound_rx: mpsc::Receiver<AudioEnvelope>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    connect_notify: Arc<Notify>,
    shutdown: CancellationToken,
) {
    let mut driver = Driver {
        config,
        state: ChannelState::Idle,
        state_tx,
        outbound_rx,
        outbound_open: true,
        inbound_tx,
        connect_notify,
        shutdown,
    };

    // Sessions connect as soon as they exist.
    let mut action = driver.transition(LifecycleEvent::ConnectRequested);

    while let Some(next) = action {
        if driver.shutdown.is_cancelled() {
            break;
        }
        action = match next {
            LifecycleAction::OpenTransport => driver.open_and_drive().await,
            LifecycleAction::ScheduleRetry => driver.wait_for_retry().await,
        };
    }

    debug!("Channel session task exiting");
}

impl Driver {
    fn transition(&mut self, event: LifecycleEvent) -> Option<LifecycleAction> {
        let (next, action) = reduce(self.state, event);
        if next != self.state {
            debug!("Channel state: {:?} -> {:?} ({:?})", self.state, next, event);
            self.state = next;
            let _ = self.state_tx.send(next);
        }
        action
    }

    /// Open a transport and drive it until it dies or we shut down.
    /// Returns the follow-up action, or `None` on shutdown.
    async fn open_and_drive(&mut self) -> Option<LifecycleAction> {
        let stream = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            result = open_transport(&self.config) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Channel connect to {} failed: {}", self.config.url, e);
                    return self.transition(LifecycleEvent::TransportErrored);
                }
            },
        };

        info!("Channel connected to {}", self.config.url);
        let opened = self.transition(LifecycleEvent::TransportOpened);
        debug_assert!(opened.is_none());

        match self.drive_open(stream).await {
            Some(event) => self.transition(event),
            None => None,
        }
    }

    /// Pump the open socket: outbound envelopes down, inbound frames up,
    /// in arrival order. Returns the terminating event, or `None` on
    /// shutdown.
    async fn drive_open(
        &mut self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> Option<LifecycleEvent> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    if let Err(e) = write.close().await {
                        debug!("Error closing channel: {}", e);
                    }
                    return None;
                }
                envelope = self.outbound_rx.recv(), if self.outbound_open => {
                    match envelope {
                        Some(envelope) => match envelope.to_json() {
                            Ok(json) => {
                                if let Err(e) = write.send(Message::Text(json)).await {
                                    warn!("Failed to send audio envelope: {}", e);
                                    return Some(LifecycleEvent::TransportErrored);
                                }
                                debug!("Audio envelope sent");
                            }
                            Err(e) => warn!("Failed to serialize envelope: {}", e),
                        },
                        None => self.outbound_open = false,
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<InboundMessage>(&text) {
                                Ok(msg) => {
                                    if self.inbound_tx.send(msg).await.is_err() {
                                        debug!("Inbound receiver dropped");
                                    }
                                }
                                Err(e) => warn!("Unparseable channel frame: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Channel closed by server");
                            return Some(LifecycleEvent::TransportClosed);
                        }
                        Some(Ok(_)) => {} // ping/pong/binary
                        Some(Err(e)) => {
                            warn!("Channel transport error: {}", e);
                            return Some(LifecycleEvent::TransportErrored);
                        }
                        None => {
                            info!("Channel stream ended");
                            return Some(LifecycleEvent::TransportClosed);
                        }
                    }
                }
            }
        }
    }

    /// Sleep out the fixed reconnect delay. Envelopes arriving meanwhile
    /// are dropped, an explicit connect request cuts the delay short, and
    /// shutdown cancels the timer outright.
    async fn wait_for_retry(&mut self) -> Option<LifecycleAction> {
        info!("Reconnecting in {:?}", self.config.reconnect_delay);
        let sleep = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = &mut sleep => break,
                _ = self.connect_notify.notified() => {
                    debug!("Connect requested, skipping remaining retry delay");
                    break;
                }
                envelope = self.outbound_rx.recv(), if self.outbound_open => {
                    match envelope {
                        Some(_) => warn!("Channel not open, dropping audio envelope"),
                        None => self.outbound_open = false,
                    }
                }
            }
        }

        self.transition(LifecycleEvent::RetryElapsed)
    }
}

async fn open_transport(
    config: &ChannelConfig,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, String> {
    match timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("connection timeout".to_string()),
    }
}
