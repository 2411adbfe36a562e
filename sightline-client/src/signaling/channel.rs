use crate::error::ChannelError;
use crate::signaling::backoff::BackoffPolicy;
use crate::signaling::connector::{Connector, Socket, WsConnector};
use crate::signaling::dispatch::Dispatcher;
use crate::signaling::signaling_output::SignalingOutput;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use sightline_core::{ClientId, ConnectionState, Envelope, MessageKind, SignalMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub heartbeat_interval: Duration,
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
        }
    }
}

struct ActiveSocket {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct ChannelInner {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    active: Mutex<Option<ActiveSocket>>,
    client_id: Mutex<Option<ClientId>>,
    dispatcher: Dispatcher,
}

/// Persistent message channel to the signaling server.
///
/// Owns exactly one socket at a time. A background supervisor task pumps
/// outbound messages, dispatches inbound ones, sends heartbeats and
/// reconnects with exponential backoff after an unexpected close.
#[derive(Clone)]
pub struct SignalingChannel {
    inner: Arc<ChannelInner>,
}

impl SignalingChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                config,
                connector,
                state,
                attempts: AtomicU32::new(0),
                outbound: Mutex::new(None),
                active: Mutex::new(None),
                client_id: Mutex::new(None),
                dispatcher: Dispatcher::default(),
            }),
        }
    }

    /// Opens a socket to `endpoint`, replacing any previous one.
    ///
    /// A failed first attempt leaves the channel `Disconnected`; reconnects
    /// only apply to sockets that were established once.
    pub async fn connect(&self, endpoint: &Url) -> Result<(), ChannelError> {
        self.inner.shutdown_active();
        self.inner.attempts.store(0, Ordering::SeqCst);
        self.inner.set_state(ConnectionState::Connecting);
        info!("Connecting signaling channel to {}", endpoint);

        let socket = match self.inner.open(endpoint).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Signaling connect to {} failed: {}", endpoint, e);
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let outbound_rx = self.inner.install();
        let task = tokio::spawn(supervise(
            self.inner.clone(),
            endpoint.clone(),
            socket,
            outbound_rx,
            cancel.clone(),
        ));

        *self.inner.active.lock() = Some(ActiveSocket { cancel, task });
        Ok(())
    }

    /// Queues a message on the open socket; `false` when not connected.
    pub fn send(&self, mut envelope: Envelope) -> bool {
        if !self.state().is_connected() {
            debug!("Dropping {} while {}", envelope.kind(), self.state());
            return false;
        }
        if envelope.client_id.is_none() {
            envelope.client_id = self.client_id();
        }
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize {} message: {}", envelope.kind(), e);
                return false;
            }
        };
        match self.inner.outbound.lock().as_ref() {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Stops heartbeat and reconnect timers and closes the socket. Idempotent.
    pub fn disconnect(&self) {
        let had_socket = self.inner.shutdown_active();
        self.inner.attempts.store(0, Ordering::SeqCst);
        self.inner.set_state(ConnectionState::Disconnected);
        if had_socket {
            info!("Signaling channel disconnected");
        }
    }

    pub fn on_message<F>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.dispatcher.register(kind, Arc::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.inner.client_id.lock().clone()
    }
}

impl SignalingOutput for SignalingChannel {
    fn send(&self, envelope: Envelope) -> bool {
        SignalingChannel::send(self, envelope)
    }

    fn local_id(&self) -> Option<ClientId> {
        self.client_id()
    }
}

impl ChannelInner {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("Signaling state {} -> {}", current, next);
            *current = next;
            true
        });
    }

    async fn open(&self, endpoint: &Url) -> Result<Socket, ChannelError> {
        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.connect(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout(timeout)),
        }
    }

    /// Publishes a fresh outbound queue for a newly opened socket.
    fn install(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(tx);
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        rx
    }

    fn shutdown_active(&self) -> bool {
        self.outbound.lock().take();
        match self.active.lock().take() {
            Some(active) => {
                active.cancel.cancel();
                drop(active.task);
                true
            }
            None => false,
        }
    }

    fn encode(&self, message: SignalMessage) -> Option<String> {
        let mut envelope = Envelope::new(message);
        envelope.client_id = self.client_id.lock().clone();
        envelope.to_json().ok()
    }

    fn handle_inbound(&self, text: &str) {
        match Envelope::parse(text) {
            Ok(Some(envelope)) => {
                if let SignalMessage::ClientInfo { client_id, .. } = &envelope.message {
                    info!("Signaling server assigned client id {}", client_id);
                    *self.client_id.lock() = Some(client_id.clone());
                }
                debug!(kind = %envelope.kind(), "Signaling message received");
                self.dispatcher.dispatch(&envelope);
            }
            Ok(None) => debug!("Ignoring signaling message of unknown type"),
            Err(e) => warn!("Dropping malformed signaling message: {}", e),
        }
    }
}

enum SocketEnd {
    Cancelled,
    Closed,
}

async fn supervise(
    inner: Arc<ChannelInner>,
    endpoint: Url,
    mut socket: Socket,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        if let SocketEnd::Cancelled = pump(&inner, socket, outbound_rx, &cancel).await {
            return;
        }
        if cancel.is_cancelled() {
            return;
        }
        warn!("Signaling socket closed unexpectedly");
        inner.outbound.lock().take();

        (socket, outbound_rx) = match reconnect(&inner, &endpoint, &cancel).await {
            Some(reopened) => reopened,
            None => return,
        };
    }
}

async fn reconnect(
    inner: &ChannelInner,
    endpoint: &Url,
    cancel: &CancellationToken,
) -> Option<(Socket, mpsc::UnboundedReceiver<String>)> {
    let policy = inner.config.backoff;

    loop {
        let attempt = inner.attempts.load(Ordering::SeqCst);
        if cancel.is_cancelled() {
            return None;
        }
        if policy.exhausted(attempt) {
            error!("Giving up on signaling after {} reconnect attempts", attempt);
            inner.set_state(ConnectionState::Failed);
            return None;
        }

        inner.set_state(ConnectionState::Reconnecting);
        let delay = policy.delay(attempt);
        info!(attempt = attempt + 1, ?delay, "Scheduling signaling reconnect");

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        inner.attempts.fetch_add(1, Ordering::SeqCst);

        let opened = tokio::select! {
            _ = cancel.cancelled() => return None,
            opened = inner.open(endpoint) => opened,
        };

        match opened {
            Ok(socket) => {
                info!("Signaling channel reconnected to {}", endpoint);
                return Some((socket, inner.install()));
            }
            Err(e) => warn!("Signaling reconnect attempt failed: {}", e),
        }
    }
}

async fn pump(
    inner: &ChannelInner,
    socket: Socket,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> SocketEnd {
    let Socket {
        mut sink,
        mut stream,
    } = socket;

    let period = inner.config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return SocketEnd::Cancelled;
            }

            outgoing = outbound_rx.recv() => {
                let Some(text) = outgoing else {
                    let _ = sink.close().await;
                    return SocketEnd::Cancelled;
                };
                if let Err(e) = sink.send(text).await {
                    warn!("Signaling send failed: {}", e);
                    return SocketEnd::Closed;
                }
            }

            incoming = stream.next() => match incoming {
                Some(Ok(text)) => inner.handle_inbound(&text),
                Some(Err(e)) => {
                    warn!("Signaling socket error: {}", e);
                    return SocketEnd::Closed;
                }
                None => return SocketEnd::Closed,
            },

            _ = heartbeat.tick() => {
                let Some(ping) = inner.encode(SignalMessage::Ping { timestamp: unix_millis() }) else {
                    continue;
                };
                if let Err(e) = sink.send(ping).await {
                    warn!("Heartbeat failed: {}", e);
                    return SocketEnd::Closed;
                }
            }
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
