use crate::session::session_state::{IceConnectionState, PeerConnectionState};
use sightline_core::{IceCandidate, MediaKind};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub track_id: String,
    pub stream_id: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    CandidateGenerated(IceCandidate),
    ConnectionStateChanged(PeerConnectionState),
    IceStateChanged(IceConnectionState),
    TrackReceived(RemoteTrackInfo),
}

/// Event sink handed to one peer transport, tagged with its generation.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::Sender<(u64, TransportEvent)>,
}

impl TransportEvents {
    pub fn new(generation: u64, tx: mpsc::Sender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the owning session has gone away.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).await.is_ok()
    }
}
