mod media_track;
mod peer_session;
mod peer_transport;
mod rtc_transport;
mod session_state;
mod transport_event;

pub use media_track::MediaTrack;
pub use peer_session::{
    PeerSession, PeerSessionHandle, PeerSessionManager, Role, SessionConfig, SessionInput,
};
pub use peer_transport::{PeerTransport, PeerTransportFactory};
pub use rtc_transport::{RtcPeerTransport, RtcTransportFactory};
pub use session_state::{IceConnectionState, PeerConnectionState, SessionState};
pub use transport_event::{RemoteTrackInfo, TransportEvent, TransportEvents};
