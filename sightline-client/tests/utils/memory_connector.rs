use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use sightline_client::signaling::{Connector, Socket};
use sightline_client::ChannelError;
use sightline_core::{Envelope, SignalMessage};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// Server end of one in-memory socket.
pub struct ServerSide {
    incoming: fmpsc::UnboundedReceiver<String>,
    outgoing: fmpsc::UnboundedSender<Result<String, ChannelError>>,
}

impl ServerSide {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.outgoing.unbounded_send(Ok(text.into()));
    }

    pub fn push(&self, envelope: Envelope) {
        let text = envelope.to_json().expect("Failed to encode envelope");
        self.push_text(text);
    }

    /// Next text frame the client wrote, parsed.
    pub async fn next_envelope(&mut self, timeout_ms: u64) -> Option<Envelope> {
        let text = tokio::time::timeout(Duration::from_millis(timeout_ms), self.incoming.next())
            .await
            .ok()??;
        Envelope::parse(&text).ok().flatten()
    }

    /// Next envelope that is not a heartbeat.
    pub async fn next_non_ping(&mut self, timeout_ms: u64) -> Option<Envelope> {
        loop {
            let envelope = self.next_envelope(timeout_ms).await?;
            if !matches!(envelope.message, SignalMessage::Ping { .. }) {
                return Some(envelope);
            }
        }
    }
}

/// Connector that hands out in-memory sockets and records every attempt.
pub struct MemoryConnector {
    servers: mpsc::UnboundedSender<ServerSide>,
    attempts: Mutex<Vec<Instant>>,
    /// Outcomes for upcoming attempts; empty means "accept".
    script: Mutex<VecDeque<bool>>,
    refuse_all: Mutex<bool>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerSide>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            servers,
            attempts: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            refuse_all: Mutex::new(false),
        };
        (connector, rx)
    }

    pub fn refuse_all(&self, refuse: bool) {
        *self.refuse_all.lock() = refuse;
    }

    /// Queue per-attempt outcomes: `true` accepts, `false` refuses.
    pub fn script(&self, outcomes: &[bool]) {
        self.script.lock().extend(outcomes.iter().copied());
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &Url) -> Result<Socket, ChannelError> {
        self.attempts.lock().push(Instant::now());

        let scripted = self.script.lock().pop_front();
        let accept = scripted.unwrap_or(!*self.refuse_all.lock());
        if !accept {
            return Err(ChannelError::Connect("connection refused".to_owned()));
        }

        let (client_tx, server_rx) = fmpsc::unbounded::<String>();
        let (server_tx, client_rx) = fmpsc::unbounded::<Result<String, ChannelError>>();

        let _ = self.servers.send(ServerSide {
            incoming: server_rx,
            outgoing: server_tx,
        });

        let sink = client_tx.sink_map_err(|_| ChannelError::Closed);
        Ok(Socket::new(sink, client_rx))
    }
}

pub fn test_url() -> Url {
    Url::parse("ws://127.0.0.1:1/ws").expect("Failed to parse test url")
}
