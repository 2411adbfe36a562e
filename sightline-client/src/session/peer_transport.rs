use crate::error::SessionError;
use crate::session::media_track::MediaTrack;
use crate::session::transport_event::TransportEvents;
use async_trait::async_trait;
use sightline_core::{IceCandidate, SessionDescription};
use std::sync::Arc;

/// One negotiated media connection to a remote peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: Arc<MediaTrack>) -> Result<(), SessionError>;

    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, SessionError>;

    async fn create_answer(&self) -> Result<SessionDescription, SessionError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), SessionError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SessionError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}

/// Builds fresh transports; used on first negotiation and on every full restart.
#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    async fn create(&self, events: TransportEvents) -> Result<Arc<dyn PeerTransport>, SessionError>;
}
