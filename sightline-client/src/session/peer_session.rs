use crate::error::SessionError;
use crate::session::media_track::MediaTrack;
use crate::session::peer_transport::{PeerTransport, PeerTransportFactory};
use crate::session::session_state::{IceConnectionState, PeerConnectionState, SessionState};
use crate::session::transport_event::{RemoteTrackInfo, TransportEvent, TransportEvents};
use crate::signaling::SignalingOutput;
use sightline_core::{
    BitrateLadder, ClientId, Envelope, IceCandidate, MediaKind, SessionDescription, SessionId,
    SignalMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait between tearing a failed transport down and building its replacement.
    pub recovery_delay: Duration,
    /// Full restarts allowed before the session gives up.
    pub max_recoveries: u32,
    pub bitrate_ladder: BitrateLadder,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recovery_delay: Duration::from_secs(1),
            max_recoveries: 5,
            bitrate_ladder: BitrateLadder::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

/// State owned by exactly one [`PeerSessionManager`].
#[derive(Clone)]
pub struct PeerSession {
    pub id: SessionId,
    pub state: SessionState,
    pub local_tracks: Vec<Arc<MediaTrack>>,
    pub remote_tracks: Vec<RemoteTrackInfo>,
    pub connection_state: PeerConnectionState,
    pub ice_connection_state: IceConnectionState,
    pub remote_peer_id: Option<ClientId>,
    pub reconnect_count: u32,
}

pub enum SessionInput {
    /// Start negotiating as the offering side.
    Start { remote: ClientId },
    /// Inbound `offer`, `answer` or `ice-candidate`.
    Signal(Envelope),
    BandwidthEstimate(u64),
    Cleanup,
}

/// Drives a single peer connection through offer/answer, trickle ICE and
/// staged recovery.
pub struct PeerSessionManager {
    session: PeerSession,
    config: SessionConfig,
    factory: Arc<dyn PeerTransportFactory>,
    signaling: Arc<dyn SignalingOutput>,
    transport: Option<Arc<dyn PeerTransport>>,
    generation: u64,
    events_tx: mpsc::Sender<(u64, TransportEvent)>,
    events_rx: mpsc::Receiver<(u64, TransportEvent)>,
    role: Option<Role>,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
    ice_restart_attempted: bool,
    recovery_deadline: Option<Instant>,
    current_bitrate: u32,
    state_tx: watch::Sender<SessionState>,
}

impl PeerSessionManager {
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn PeerTransportFactory>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let current_bitrate = config.bitrate_ladder.highest();

        Self {
            session: PeerSession {
                id: SessionId::new(),
                state: SessionState::Idle,
                local_tracks: Vec::new(),
                remote_tracks: Vec::new(),
                connection_state: PeerConnectionState::New,
                ice_connection_state: IceConnectionState::New,
                remote_peer_id: None,
                reconnect_count: 0,
            },
            config,
            factory,
            signaling,
            transport: None,
            generation: 0,
            events_tx,
            events_rx,
            role: None,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            ice_restart_attempted: false,
            recovery_deadline: None,
            current_bitrate,
            state_tx,
        }
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn recovery_pending(&self) -> bool {
        self.recovery_deadline.is_some()
    }

    pub fn current_bitrate(&self) -> u32 {
        self.current_bitrate
    }

    pub async fn add_local_track(&mut self, track: Arc<MediaTrack>) -> Result<(), SessionError> {
        if track.kind() == MediaKind::Video {
            track.set_max_bitrate(self.current_bitrate);
        }
        if let Some(transport) = &self.transport {
            transport.add_track(track.clone()).await?;
        }
        self.session.local_tracks.push(track);
        Ok(())
    }

    /// Creates an offer for `remote` and sends it to that peer only.
    pub async fn start_offer(&mut self, remote: ClientId) -> Result<(), SessionError> {
        self.ensure_open()?;
        info!("Session {} offering to {}", self.session.id, remote);

        self.session.remote_peer_id = Some(remote);
        self.role = Some(Role::Offerer);
        self.ensure_transport().await?;
        self.set_state(SessionState::Offering);
        self.send_offer(false).await
    }

    pub async fn handle_signal(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        let from = envelope.client_id;
        match envelope.message {
            SignalMessage::Offer { offer } => {
                let Some(from) = from else {
                    warn!("Dropping offer without a sender id");
                    return Ok(());
                };
                self.accept_offer(from, offer).await
            }
            SignalMessage::Answer { answer } => {
                if !self.is_remote(from.as_ref()) {
                    warn!("Dropping answer from unexpected peer {:?}", from);
                    return Ok(());
                }
                self.accept_answer(answer).await
            }
            SignalMessage::IceCandidate { candidate } => {
                if !self.is_remote(from.as_ref()) {
                    warn!("Dropping ICE candidate from unexpected peer {:?}", from);
                    return Ok(());
                }
                self.accept_remote_candidate(candidate).await;
                Ok(())
            }
            other => {
                debug!("Session ignores {} messages", other.kind());
                Ok(())
            }
        }
    }

    async fn accept_offer(
        &mut self,
        from: ClientId,
        offer: SessionDescription,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        info!("Session {} answering offer from {}", self.session.id, from);

        // A fresh offer while recovering belongs to a rebuilt remote transport.
        if self.session.state == SessionState::Recovering {
            self.teardown_transport().await;
            self.recovery_deadline = None;
        }

        self.session.remote_peer_id = Some(from.clone());
        if self.role.is_none() {
            self.role = Some(Role::Answerer);
        }
        self.ensure_transport().await?;
        self.set_state(SessionState::Answering);

        let renegotiating = self.remote_description_set;
        let mut transport = self.transport()?;
        if let Err(e) = transport.set_remote_description(offer.clone()).await {
            if !renegotiating {
                return Err(e);
            }
            warn!("Current transport rejected the new offer ({}), rebuilding", e);
            self.teardown_transport().await;
            self.ensure_transport().await?;
            transport = self.transport()?;
            transport.set_remote_description(offer).await?;
        }
        self.remote_description_set = true;
        self.flush_pending_candidates().await;

        let answer = transport.create_answer().await?;
        transport.set_local_description(answer.clone()).await?;

        if !self.signaling.send_to(from, SignalMessage::Answer { answer }) {
            return Err(SessionError::SignalingUnavailable);
        }
        self.settle_negotiation();
        Ok(())
    }

    async fn accept_answer(&mut self, answer: SessionDescription) -> Result<(), SessionError> {
        self.ensure_open()?;
        let transport = self.transport()?;
        transport.set_remote_description(answer).await?;
        self.remote_description_set = true;
        self.flush_pending_candidates().await;
        self.settle_negotiation();
        Ok(())
    }

    async fn accept_remote_candidate(&mut self, candidate: IceCandidate) {
        match &self.transport {
            Some(transport) if self.remote_description_set => {
                if let Err(e) = transport.add_ice_candidate(candidate).await {
                    warn!("Failed to add remote ICE candidate: {}", e);
                }
            }
            _ => {
                debug!("Buffering remote ICE candidate until the remote description is set");
                self.pending_candidates.push(candidate);
            }
        }
    }

    async fn flush_pending_candidates(&mut self) {
        let Some(transport) = self.transport.clone() else {
            return;
        };
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("Applying {} buffered ICE candidates", pending.len());
        }
        for candidate in pending {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Failed to add buffered ICE candidate: {}", e);
            }
        }
    }

    /// Negotiation finished on our side; an already connected transport stays connected.
    fn settle_negotiation(&mut self) {
        if self.session.connection_state == PeerConnectionState::Connected {
            self.ice_restart_attempted = false;
            self.set_state(SessionState::Connected);
        } else {
            self.set_state(SessionState::Negotiating);
        }
    }

    async fn send_offer(&mut self, ice_restart: bool) -> Result<(), SessionError> {
        let remote = self
            .session
            .remote_peer_id
            .clone()
            .ok_or(SessionError::NoRemotePeer)?;
        let transport = self.transport()?;

        let offer = transport.create_offer(ice_restart).await?;
        transport.set_local_description(offer.clone()).await?;

        if !self.signaling.send_to(remote, SignalMessage::Offer { offer }) {
            return Err(SessionError::SignalingUnavailable);
        }
        self.set_state(SessionState::Negotiating);
        Ok(())
    }

    pub async fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            debug!("Ignoring event from retired transport generation {}", generation);
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                let Some(remote) = self.session.remote_peer_id.clone() else {
                    warn!("Local ICE candidate generated before a remote peer is known");
                    return;
                };
                if !self
                    .signaling
                    .send_to(remote, SignalMessage::IceCandidate { candidate })
                {
                    warn!("Local ICE candidate could not be sent");
                }
            }

            TransportEvent::ConnectionStateChanged(state) => {
                self.session.connection_state = state;
                match state {
                    PeerConnectionState::Connected => {
                        info!("Session {} connected", self.session.id);
                        self.ice_restart_attempted = false;
                        self.recovery_deadline = None;
                        self.set_state(SessionState::Connected);
                    }
                    PeerConnectionState::Failed | PeerConnectionState::Closed => {
                        if self.session.state != SessionState::Closed {
                            self.schedule_full_restart(&format!("peer connection {:?}", state))
                                .await;
                        }
                    }
                    _ => {}
                }
            }

            TransportEvent::IceStateChanged(state) => {
                self.session.ice_connection_state = state;
                if state == IceConnectionState::Failed && self.session.state != SessionState::Closed
                {
                    self.on_ice_failed().await;
                }
            }

            TransportEvent::TrackReceived(track) => {
                info!(
                    "Session {} received remote {:?} track {}",
                    self.session.id, track.kind, track.track_id
                );
                self.session.remote_tracks.push(track);
            }
        }
    }

    async fn on_ice_failed(&mut self) {
        if self.recovery_deadline.is_some() {
            return;
        }
        if self.ice_restart_attempted {
            self.schedule_full_restart("ICE failed again after restart").await;
            return;
        }

        self.ice_restart_attempted = true;
        self.set_state(SessionState::Recovering);

        if self.role != Some(Role::Offerer) {
            // The offering side owns renegotiation; fall back if it never arrives.
            info!("ICE failed, waiting for the offering peer to restart ICE");
            self.recovery_deadline = Some(Instant::now() + self.config.recovery_delay * 5);
            return;
        }

        info!("ICE failed, attempting ICE restart");
        if let Err(e) = self.send_offer(true).await {
            warn!("ICE restart failed: {}", e);
            self.schedule_full_restart("ICE restart failed").await;
        }
    }

    async fn schedule_full_restart(&mut self, reason: &str) {
        if self.recovery_deadline.is_some() && self.transport.is_none() {
            return;
        }
        warn!(
            "Session {} scheduling full restart in {:?}: {}",
            self.session.id, self.config.recovery_delay, reason
        );
        self.set_state(SessionState::Recovering);
        self.teardown_transport().await;
        self.recovery_deadline = Some(Instant::now() + self.config.recovery_delay);
    }

    /// Rebuilds the transport once the recovery delay has elapsed.
    pub async fn recover(&mut self) -> Result<(), SessionError> {
        self.recovery_deadline = None;
        if self.session.state == SessionState::Closed {
            return Ok(());
        }
        self.teardown_transport().await;

        if self.session.reconnect_count >= self.config.max_recoveries {
            error!(
                "Session {} exhausted {} full restarts",
                self.session.id, self.session.reconnect_count
            );
            let restarts = self.session.reconnect_count;
            self.cleanup().await;
            return Err(SessionError::RecoveryExhausted(restarts));
        }

        self.session.reconnect_count += 1;
        self.ice_restart_attempted = false;
        info!(
            "Session {} full restart #{}",
            self.session.id, self.session.reconnect_count
        );

        if let Err(e) = self.ensure_transport().await {
            warn!("Failed to rebuild peer transport: {}", e);
            self.schedule_full_restart("transport rebuild failed").await;
            return Ok(());
        }

        match self.role {
            Some(Role::Offerer) => {
                self.set_state(SessionState::Offering);
                if let Err(e) = self.send_offer(false).await {
                    warn!("Renegotiation after restart failed: {}", e);
                    self.schedule_full_restart("renegotiation failed").await;
                }
            }
            _ => self.set_state(SessionState::Idle),
        }
        Ok(())
    }

    /// Applies a bandwidth estimate to every local video track.
    pub fn on_bandwidth_estimate(&mut self, available_bps: u64) {
        let tier = self.config.bitrate_ladder.tier_for(available_bps);
        if tier == self.current_bitrate {
            return;
        }
        info!(
            "Session {} bitrate cap {} -> {} bps",
            self.session.id, self.current_bitrate, tier
        );
        self.current_bitrate = tier;
        for track in &self.session.local_tracks {
            if track.kind() == MediaKind::Video {
                track.set_max_bitrate(tier);
            }
        }
    }

    /// Closes the transport, stops local tracks and cancels recovery. Idempotent.
    pub async fn cleanup(&mut self) {
        if self.session.state == SessionState::Closed && self.transport.is_none() {
            return;
        }
        self.recovery_deadline = None;
        self.teardown_transport().await;
        for track in &self.session.local_tracks {
            track.stop();
        }
        self.set_state(SessionState::Closed);
        info!("Session {} closed", self.session.id);
    }

    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) -> Result<(), SessionError> {
        info!("Session {} event loop started", self.session.id);

        loop {
            let deadline = self.recovery_deadline;
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                input = inputs.recv() => {
                    let result = match input {
                        Some(SessionInput::Start { remote }) => self.start_offer(remote).await,
                        Some(SessionInput::Signal(envelope)) => self.handle_signal(envelope).await,
                        Some(SessionInput::BandwidthEstimate(bps)) => {
                            self.on_bandwidth_estimate(bps);
                            Ok(())
                        }
                        Some(SessionInput::Cleanup) | None => {
                            self.cleanup().await;
                            break;
                        }
                    };
                    if let Err(e) = result {
                        self.on_negotiation_error(e).await;
                    }
                }

                Some((generation, event)) = self.events_rx.recv() => {
                    self.handle_transport_event(generation, event).await;
                }

                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    self.recover().await?;
                }
            }
        }

        info!("Session {} event loop finished", self.session.id);
        Ok(())
    }

    pub fn spawn(self) -> PeerSessionHandle {
        let (inputs, inputs_rx) = mpsc::channel(64);
        let state = self.watch_state();
        let task = tokio::spawn(self.run(inputs_rx));
        PeerSessionHandle {
            inputs,
            state,
            task,
        }
    }

    async fn on_negotiation_error(&mut self, e: SessionError) {
        match e {
            SessionError::Closed => debug!("Ignoring input for closed session"),
            e => {
                warn!("Negotiation failed: {}", e);
                self.schedule_full_restart(&e.to_string()).await;
            }
        }
    }

    async fn ensure_transport(&mut self) -> Result<(), SessionError> {
        if self.transport.is_some() {
            return Ok(());
        }

        self.generation += 1;
        let events = TransportEvents::new(self.generation, self.events_tx.clone());
        let transport = self.factory.create(events).await?;

        for track in &self.session.local_tracks {
            transport.add_track(track.clone()).await?;
        }

        self.transport = Some(transport);
        self.session.connection_state = PeerConnectionState::New;
        self.session.ice_connection_state = IceConnectionState::New;
        self.remote_description_set = false;
        Ok(())
    }

    /// Drops the transport and any candidates buffered for it.
    async fn teardown_transport(&mut self) {
        if !self.pending_candidates.is_empty() {
            debug!("Discarding {} stale ICE candidates", self.pending_candidates.len());
            self.pending_candidates.clear();
        }
        let Some(transport) = self.transport.take() else {
            return;
        };
        self.generation += 1;
        self.remote_description_set = false;
        self.session.remote_tracks.clear();
        if let Err(e) = transport.close().await {
            warn!("Failed to close peer transport: {}", e);
        }
    }

    fn transport(&self) -> Result<Arc<dyn PeerTransport>, SessionError> {
        self.transport.clone().ok_or(SessionError::NoTransport)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.session.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn is_remote(&self, from: Option<&ClientId>) -> bool {
        match (&self.session.remote_peer_id, from) {
            (Some(remote), Some(from)) => remote == from,
            (None, _) => true,
            (Some(_), None) => true,
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.session.state == next {
            return;
        }
        debug!("Session {} {} -> {}", self.session.id, self.session.state, next);
        self.session.state = next;
        self.state_tx.send_replace(next);
    }
}

/// Handle to a [`PeerSessionManager`] running on its own task.
pub struct PeerSessionHandle {
    inputs: mpsc::Sender<SessionInput>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<Result<(), SessionError>>,
}

impl PeerSessionHandle {
    pub fn inputs(&self) -> mpsc::Sender<SessionInput> {
        self.inputs.clone()
    }

    pub async fn send(&self, input: SessionInput) -> bool {
        self.inputs.send(input).await.is_ok()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the session reaches `target`; `false` on timeout or exit.
    pub async fn wait_for_state(&mut self, target: SessionState, timeout: Duration) -> bool {
        let wait = self.state.wait_for(|state| *state == target);
        matches!(tokio::time::timeout(timeout, wait).await, Ok(Ok(_)))
    }

    pub async fn shutdown(self) -> Result<(), SessionError> {
        let _ = self.inputs.send(SessionInput::Cleanup).await;
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Session task panicked: {}", e);
                Err(SessionError::Closed)
            }
        }
    }
}
