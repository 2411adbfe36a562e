use crate::registry::stream_client::StreamClient;
use crate::signaling::SignalingOutput;
use bytes::Bytes;
use parking_lot::Mutex;
use sightline_core::{ClientId, MetricsPayload, SignalMessage};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Silence after which a remote stream counts as stopped.
    pub stream_timeout: Duration,
    pub sweep_interval: Duration,
    pub metrics_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stream_timeout: Duration::from_millis(5000),
            sweep_interval: Duration::from_secs(1),
            metrics_interval: Duration::from_secs(1),
        }
    }
}

const LOCAL_SUFFIX: &str = " (You)";

struct RegistryInner {
    config: RegistryConfig,
    clients: Mutex<HashMap<ClientId, StreamClient>>,
    local_id: Mutex<Option<ClientId>>,
    signaling: Option<Arc<dyn SignalingOutput>>,
    timers: Mutex<Option<JoinHandle<()>>>,
    version: watch::Sender<u64>,
}

/// Authoritative table of local and remote streams with liveness tracking.
///
/// The sweep and metrics timers run only while the table is non-empty.
#[derive(Clone)]
pub struct StreamRegistry {
    inner: Arc<RegistryInner>,
}

impl StreamRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::build(config, None)
    }

    /// Registry that broadcasts local metrics through `signaling`.
    pub fn with_signaling(config: RegistryConfig, signaling: Arc<dyn SignalingOutput>) -> Self {
        Self::build(config, Some(signaling))
    }

    fn build(config: RegistryConfig, signaling: Option<Arc<dyn SignalingOutput>>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RegistryInner {
                config,
                clients: Mutex::new(HashMap::new()),
                local_id: Mutex::new(None),
                signaling,
                timers: Mutex::new(None),
                version,
            }),
        }
    }

    /// Inserts a zeroed entry unless one already exists.
    ///
    /// A local client registered under a new id (the server assigns one per
    /// connection) replaces the previous local entry.
    pub fn initialize_client(&self, id: ClientId, display_name: &str, is_local: bool) {
        let previous_local = if is_local {
            self.local_id().filter(|previous| *previous != id)
        } else {
            None
        };
        let inserted = {
            let mut clients = self.inner.clients.lock();
            if let Some(previous) = &previous_local {
                if clients.remove(previous).is_some() {
                    info!("Local client re-registered as {}, dropped {}", id, previous);
                }
            }
            if clients.contains_key(&id) {
                false
            } else {
                let display_name = if is_local && !display_name.ends_with(LOCAL_SUFFIX) {
                    format!("{display_name}{LOCAL_SUFFIX}")
                } else {
                    display_name.to_owned()
                };
                info!("Registered {} stream {} ({})", if is_local { "local" } else { "remote" }, id, display_name);
                clients.insert(id.clone(), StreamClient::new(id.clone(), display_name, is_local));
                true
            }
        };
        if !inserted && previous_local.is_none() {
            return;
        }
        if is_local {
            *self.inner.local_id.lock() = Some(id);
        }
        self.inner.ensure_timers();
        self.inner.touch();
    }

    pub fn local_id(&self) -> Option<ClientId> {
        self.inner.local_id.lock().clone()
    }

    /// Records a local capture event and broadcasts the resulting metrics.
    pub fn update_local_stream(&self, is_streaming: bool, frame: Option<Bytes>) {
        let Some(local_id) = self.local_id() else {
            warn!("Local stream update before the local client was initialized");
            return;
        };
        let now = Instant::now();

        let (payload, toggled) = {
            let mut clients = self.inner.clients.lock();
            let Some(client) = clients.get_mut(&local_id) else {
                return;
            };
            let toggled = client.is_streaming != is_streaming;
            if is_streaming {
                client.is_streaming = true;
                match frame {
                    Some(frame) => {
                        client.metrics.record_frame(now);
                        client.last_frame = Some(frame);
                    }
                    None => {
                        client.metrics.start_time.get_or_insert(now);
                        client.metrics.last_update_time = Some(now);
                        client.metrics.refresh_fps(now);
                    }
                }
            } else {
                client.stop();
            }
            (client.metrics.to_payload(now, client.is_streaming), toggled)
        };

        if toggled {
            info!("Local stream {} {}", local_id, if is_streaming { "started" } else { "stopped" });
            self.inner
                .broadcast(SignalMessage::StreamingStatus { is_streaming });
        }
        self.inner
            .broadcast(SignalMessage::MetricsUpdate { metrics: payload });
        self.inner.touch();
    }

    /// Records a frame observed from a remote client.
    pub fn update_client_frame(&self, id: &ClientId, frame: Bytes) {
        if self.inner.is_local(id) {
            debug!("Ignoring remote frame event naming the local client");
            return;
        }
        let now = Instant::now();
        let inserted = {
            let mut clients = self.inner.clients.lock();
            let inserted = !clients.contains_key(id);
            let client = clients
                .entry(id.clone())
                .or_insert_with(|| StreamClient::remote(id.clone()));
            if !client.is_streaming {
                info!("Remote stream {} is live", id);
            }
            client.is_streaming = true;
            client.last_frame = Some(frame);
            client.metrics.record_frame(now);
            inserted
        };
        if inserted {
            self.inner.ensure_timers();
        }
        self.inner.touch();
    }

    /// Updates a remote client's streaming flag and, optionally, its display name.
    pub fn update_client_stream(&self, id: &ClientId, display_name: Option<&str>, is_streaming: bool) {
        if self.inner.is_local(id) {
            debug!("Ignoring remote stream event naming the local client");
            return;
        }
        let now = Instant::now();
        let inserted = {
            let mut clients = self.inner.clients.lock();
            let inserted = !clients.contains_key(id);
            let client = clients
                .entry(id.clone())
                .or_insert_with(|| StreamClient::remote(id.clone()));
            if let Some(name) = display_name {
                client.display_name = name.to_owned();
            }
            if is_streaming {
                client.is_streaming = true;
                client.metrics.start_time.get_or_insert(now);
                client.metrics.last_update_time = Some(now);
            } else if client.is_streaming {
                info!("Remote stream {} stopped", id);
                client.stop();
            }
            inserted
        };
        if inserted {
            self.inner.ensure_timers();
        }
        self.inner.touch();
    }

    pub fn handle_streaming_status(&self, id: &ClientId, is_streaming: bool) {
        self.update_client_stream(id, None, is_streaming);
    }

    /// Applies a `metrics_update` reported by a remote client.
    pub fn apply_remote_metrics(&self, id: &ClientId, metrics: &MetricsPayload) {
        if self.inner.is_local(id) {
            return;
        }
        let now = Instant::now();
        let inserted = {
            let mut clients = self.inner.clients.lock();
            let inserted = !clients.contains_key(id);
            let client = clients
                .entry(id.clone())
                .or_insert_with(|| StreamClient::remote(id.clone()));
            if metrics.is_streaming {
                client.is_streaming = true;
                client.metrics.frame_count = metrics.frame_count;
                client.metrics.fps = metrics.fps;
                client.metrics.start_time = Some(
                    now.checked_sub(Duration::from_millis(metrics.duration_ms))
                        .unwrap_or(now),
                );
                client.metrics.last_update_time = Some(now);
            } else {
                client.stop();
            }
            inserted
        };
        if inserted {
            self.inner.ensure_timers();
        }
        self.inner.touch();
    }

    /// Stops the local stream, or forgets a remote one.
    pub fn remove_client(&self, id: &ClientId) {
        if self.inner.is_local(id) {
            self.update_local_stream(false, None);
            return;
        }
        let now_empty = {
            let mut clients = self.inner.clients.lock();
            if clients.remove(id).is_some() {
                info!("Removed remote stream {}", id);
            }
            clients.is_empty()
        };
        if now_empty {
            self.inner.stop_timers();
        }
        self.inner.touch();
    }

    /// Drops every entry and stops the timers.
    pub fn clear_streams(&self) {
        self.inner.clients.lock().clear();
        self.inner.local_id.lock().take();
        self.inner.stop_timers();
        self.inner.touch();
    }

    /// Snapshot for presentation: local entry first, then remote ones by id.
    pub fn clients_list(&self) -> Vec<StreamClient> {
        let mut list: Vec<StreamClient> = self.inner.clients.lock().values().cloned().collect();
        list.sort_by(|a, b| b.is_local.cmp(&a.is_local).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn client(&self, id: &ClientId) -> Option<StreamClient> {
        self.inner.clients.lock().get(id).cloned()
    }

    pub fn stream_duration(&self, id: &ClientId) -> Duration {
        let now = Instant::now();
        self.inner
            .clients
            .lock()
            .get(id)
            .map_or(Duration::ZERO, |c| c.metrics.duration(now, c.is_streaming))
    }

    pub fn streaming_clients_count(&self) -> usize {
        self.inner
            .clients
            .lock()
            .values()
            .filter(|c| c.is_streaming)
            .count()
    }

    /// Bumped on every change; presentation layers re-read `clients_list`.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    pub fn timers_running(&self) -> bool {
        self.inner.timers.lock().is_some()
    }
}

impl RegistryInner {
    fn is_local(&self, id: &ClientId) -> bool {
        self.local_id.lock().as_ref() == Some(id)
    }

    fn touch(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn broadcast(&self, message: SignalMessage) {
        if let Some(signaling) = &self.signaling {
            if !signaling.broadcast(message) {
                debug!("Metrics broadcast skipped, signaling not connected");
            }
        }
    }

    fn ensure_timers(self: &Arc<Self>) {
        let mut timers = self.timers.lock();
        if timers.is_some() {
            return;
        }
        debug!("Starting stream registry timers");
        *timers = Some(tokio::spawn(run_timers(
            Arc::downgrade(self),
            self.config.sweep_interval,
            self.config.metrics_interval,
        )));
    }

    fn stop_timers(&self) {
        if let Some(timers) = self.timers.lock().take() {
            debug!("Stopping stream registry timers");
            timers.abort();
        }
    }

    /// Flips silent remote streams to stopped.
    fn sweep_expired(&self) {
        let now = Instant::now();
        let timeout = self.config.stream_timeout;
        let mut expired = Vec::new();
        {
            let mut clients = self.clients.lock();
            for client in clients.values_mut() {
                if client.is_local || !client.is_streaming {
                    continue;
                }
                let silent_for = client
                    .metrics
                    .last_update_time
                    .map_or(Duration::MAX, |last| now.duration_since(last));
                if silent_for > timeout {
                    client.stop();
                    expired.push(client.id.clone());
                }
            }
        }
        if !expired.is_empty() {
            for id in &expired {
                info!("Stream {} timed out after {:?} of silence", id, timeout);
            }
            self.touch();
        }
    }

    /// Recomputes fps of streaming entries. Never broadcasts.
    fn refresh_metrics(&self) {
        let now = Instant::now();
        let refreshed = {
            let mut clients = self.clients.lock();
            let mut refreshed = false;
            for client in clients.values_mut().filter(|c| c.is_streaming) {
                if client.is_local
                    || (client.metrics.start_time.is_some() && client.metrics.frame_count > 0)
                {
                    client.metrics.refresh_fps(now);
                    refreshed = true;
                }
            }
            refreshed
        };
        if refreshed {
            self.touch();
        }
    }
}

async fn run_timers(inner: Weak<RegistryInner>, sweep_every: Duration, metrics_every: Duration) {
    let mut sweep = tokio::time::interval_at(Instant::now() + sweep_every, sweep_every);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut metrics = tokio::time::interval_at(Instant::now() + metrics_every, metrics_every);
    metrics.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                let Some(inner) = inner.upgrade() else { return };
                inner.sweep_expired();
            }
            _ = metrics.tick() => {
                let Some(inner) = inner.upgrade() else { return };
                inner.refresh_metrics();
            }
        }
    }
}
