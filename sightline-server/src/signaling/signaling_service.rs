use crate::signaling::connection_stats::{ClientStats, ConnectionStats, round2};
use axum::extract::ws::Message;
use dashmap::DashMap;
use sightline_core::metrics::compute_fps;
use sightline_core::{ClientId, Envelope, MetricsPayload, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

struct ConnectedClient {
    tx: mpsc::UnboundedSender<Message>,
    display_name: String,
    connected_at: Instant,
    message_count: u64,
    frames_captured: u64,
    is_streaming: bool,
    stream_started: Option<Instant>,
    stream_frames: u64,
    last_frame_at: Option<Instant>,
}

impl ConnectedClient {
    fn metrics(&self, now: Instant) -> MetricsPayload {
        let elapsed = self
            .stream_started
            .map_or(Duration::ZERO, |start| now.duration_since(start));
        MetricsPayload {
            frame_count: self.stream_frames,
            fps: compute_fps(self.stream_frames, elapsed),
            duration_ms: elapsed.as_millis() as u64,
            is_streaming: self.is_streaming,
        }
    }

    /// Returns `true` when this frame started the stream.
    fn record_frame(&mut self, now: Instant) -> bool {
        let started = !self.is_streaming;
        if started {
            self.is_streaming = true;
            self.stream_started = Some(now);
            self.stream_frames = 0;
        }
        self.frames_captured += 1;
        self.stream_frames += 1;
        self.last_frame_at = Some(now);
        started
    }

    fn mark_streaming(&mut self, now: Instant) {
        if !self.is_streaming {
            self.is_streaming = true;
            self.stream_started = Some(now);
            self.stream_frames = 0;
        }
        self.last_frame_at = Some(now);
    }

    fn stop_stream(&mut self) {
        self.is_streaming = false;
        self.stream_started = None;
        self.stream_frames = 0;
    }
}

struct SignalingInner {
    clients: DashMap<ClientId, ConnectedClient>,
    started: Instant,
    stream_timeout: Duration,
}

/// Connected websocket clients and the relay rules between them.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(stream_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                clients: DashMap::new(),
                started: Instant::now(),
                stream_timeout,
            }),
        }
    }

    /// Admits a client, sends it `client_info` and replays the streams
    /// already in progress.
    pub fn register(
        &self,
        requested_name: Option<&str>,
        tx: mpsc::UnboundedSender<Message>,
    ) -> ClientId {
        let client_id = ClientId::generate(requested_name);
        let display_name = match requested_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => client_id.to_string(),
        };
        let now = Instant::now();

        let replay: Vec<Envelope> = self
            .inner
            .clients
            .iter()
            .filter(|entry| entry.is_streaming)
            .flat_map(|entry| {
                let id = entry.key().clone();
                [
                    Envelope::from_client(
                        id.clone(),
                        SignalMessage::StreamingStatus { is_streaming: true },
                    ),
                    Envelope::from_client(
                        id,
                        SignalMessage::MetricsUpdate {
                            metrics: entry.metrics(now),
                        },
                    ),
                ]
            })
            .collect();

        send_envelope(
            &tx,
            &Envelope::new(SignalMessage::ClientInfo {
                client_id: client_id.clone(),
                display_name: display_name.clone(),
            }),
        );
        for envelope in &replay {
            send_envelope(&tx, envelope);
        }

        self.inner.clients.insert(
            client_id.clone(),
            ConnectedClient {
                tx,
                display_name,
                connected_at: now,
                message_count: 0,
                frames_captured: 0,
                is_streaming: false,
                stream_started: None,
                stream_frames: 0,
                last_frame_at: None,
            },
        );
        info!(
            "WS connect | {} | Active clients: {}",
            client_id,
            self.client_count()
        );
        client_id
    }

    /// Forgets the client and tells everyone else it left.
    pub fn unregister(&self, client_id: &ClientId) {
        let Some((_, client)) = self.inner.clients.remove(client_id) else {
            return;
        };
        info!(
            "WS disconnect | {} | Frames: {} | Active clients: {}",
            client_id,
            client.frames_captured,
            self.client_count()
        );
        self.broadcast_except(
            client_id,
            &Envelope::from_client(client_id.clone(), SignalMessage::ClientDisconnect),
        );
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn is_connected(&self, client_id: &ClientId) -> bool {
        self.inner.clients.contains_key(client_id)
    }

    pub fn is_streaming(&self, client_id: &ClientId) -> bool {
        self.inner
            .clients
            .get(client_id)
            .is_some_and(|client| client.is_streaming)
    }

    /// Handles one text frame received from `from`.
    pub fn handle_text(&self, from: &ClientId, text: &str) {
        if let Some(mut client) = self.inner.clients.get_mut(from) {
            client.message_count += 1;
        }

        let envelope = match Envelope::parse(text) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                debug!("Ignoring message of unknown type from {}", from);
                return;
            }
            Err(e) => {
                warn!("Invalid signaling message from {}: {}", from, e);
                self.send_error(from, format!("invalid message: {e}"));
                return;
            }
        };

        let kind = envelope.kind();
        match envelope.message {
            SignalMessage::Ping { timestamp } => {
                self.send_to(from, &Envelope::new(SignalMessage::Pong { timestamp }));
            }
            message @ (SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::IceCandidate { .. }) => {
                self.relay(from, envelope.target_id, message);
            }
            SignalMessage::Frame { content, timestamp } => {
                self.broadcast_except(
                    from,
                    &Envelope::from_client(
                        from.clone(),
                        SignalMessage::Frame { content, timestamp },
                    ),
                );
                self.record_frame(from);
            }
            SignalMessage::MetricsUpdate { metrics } => {
                self.broadcast_except(
                    from,
                    &Envelope::from_client(from.clone(), SignalMessage::MetricsUpdate { metrics }),
                );
            }
            SignalMessage::StreamingStatus { is_streaming } => {
                if let Some(mut client) = self.inner.clients.get_mut(from) {
                    if is_streaming {
                        client.mark_streaming(Instant::now());
                    } else {
                        client.stop_stream();
                    }
                }
                self.broadcast_except(
                    from,
                    &Envelope::from_client(
                        from.clone(),
                        SignalMessage::StreamingStatus { is_streaming },
                    ),
                );
            }
            _ => debug!("Ignoring {} from {}", kind, from),
        }
    }

    /// Counts a frame for `from` and announces the updated metrics; the first
    /// frame of a stream also announces `streaming_status`.
    pub fn record_frame(&self, from: &ClientId) {
        let now = Instant::now();
        let (started, metrics) = {
            let Some(mut client) = self.inner.clients.get_mut(from) else {
                return;
            };
            let started = client.record_frame(now);
            (started, client.metrics(now))
        };

        self.broadcast_except(
            from,
            &Envelope::from_client(from.clone(), SignalMessage::MetricsUpdate { metrics }),
        );
        if started {
            info!("Stream started | Client: {}", from);
            self.broadcast_except(
                from,
                &Envelope::from_client(
                    from.clone(),
                    SignalMessage::StreamingStatus { is_streaming: true },
                ),
            );
        }
    }

    /// Flips streams without a frame for the configured timeout and returns
    /// the affected clients.
    pub fn sweep_inactive(&self) -> Vec<ClientId> {
        let now = Instant::now();
        let timeout = self.inner.stream_timeout;
        let mut expired = Vec::new();

        for mut entry in self.inner.clients.iter_mut() {
            if !entry.is_streaming {
                continue;
            }
            let silent_for = entry
                .last_frame_at
                .map_or(Duration::MAX, |last| now.duration_since(last));
            if silent_for > timeout {
                entry.stop_stream();
                expired.push((entry.key().clone(), entry.metrics(now)));
            }
        }

        for (client_id, metrics) in &expired {
            info!("Stream timeout | Client: {}", client_id);
            self.broadcast(&Envelope::from_client(
                client_id.clone(),
                SignalMessage::StreamingStatus {
                    is_streaming: false,
                },
            ));
            self.broadcast(&Envelope::from_client(
                client_id.clone(),
                SignalMessage::MetricsUpdate {
                    metrics: metrics.clone(),
                },
            ));
        }
        expired.into_iter().map(|(id, _)| id).collect()
    }

    pub fn stats(&self) -> ConnectionStats {
        let now = Instant::now();
        let mut clients: Vec<ClientStats> = self
            .inner
            .clients
            .iter()
            .map(|entry| ClientStats {
                id: entry.key().clone(),
                display_name: entry.display_name.clone(),
                connected_for: round2(now.duration_since(entry.connected_at).as_secs_f64()),
                message_count: entry.message_count,
                frames_captured: entry.frames_captured,
                is_streaming: entry.is_streaming,
            })
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));

        ConnectionStats {
            active_connections: clients.len(),
            uptime_seconds: round2(now.duration_since(self.inner.started).as_secs_f64()),
            clients,
        }
    }

    pub fn send_to(&self, client_id: &ClientId, envelope: &Envelope) -> bool {
        match self.inner.clients.get(client_id) {
            Some(client) => send_envelope(&client.tx, envelope),
            None => {
                warn!("Attempted to send {} to disconnected client {}", envelope.kind(), client_id);
                false
            }
        }
    }

    pub fn broadcast(&self, envelope: &Envelope) {
        for client in self.inner.clients.iter() {
            send_envelope(&client.tx, envelope);
        }
    }

    pub fn broadcast_except(&self, except: &ClientId, envelope: &Envelope) {
        for client in self.inner.clients.iter().filter(|c| c.key() != except) {
            send_envelope(&client.tx, envelope);
        }
    }

    fn relay(&self, from: &ClientId, target: Option<ClientId>, message: SignalMessage) {
        let kind = message.kind();
        let Some(target) = target else {
            self.send_error(from, format!("{kind} requires a targetId"));
            return;
        };
        if !self.is_connected(&target) {
            self.send_error(from, format!("{kind} target {target} is not connected"));
            return;
        }
        debug!("Relaying {} from {} to {}", kind, from, target);
        let envelope = Envelope::from_client(from.clone(), message).with_target(target.clone());
        self.send_to(&target, &envelope);
    }

    fn send_error(&self, to: &ClientId, message: String) {
        self.send_to(to, &Envelope::new(SignalMessage::Error { message }));
    }
}

fn send_envelope(tx: &mpsc::UnboundedSender<Message>, envelope: &Envelope) -> bool {
    match envelope.to_json() {
        Ok(json) => tx.send(Message::Text(json.into())).is_ok(),
        Err(e) => {
            error!("Failed to serialize {} message: {}", envelope.kind(), e);
            false
        }
    }
}
