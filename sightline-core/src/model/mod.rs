mod client;
mod connection;
mod health;
mod media;
mod peer;
mod room;
mod session;
mod signaling;

pub use client::ClientId;
pub use connection::ConnectionState;
pub use health::{HealthReport, HealthStatus};
pub use media::{
    BitrateLadder, CreateRoomRequest, CreateRoomResponse, DtlsFingerprint, DtlsParameters,
    DtlsRole, ErrorResponse, IceCandidateInfo, IceParameters, JoinRoomRequest, JoinRoomResponse,
    MediaCodec, MediaKind, RtpCapabilities, TransportOptions,
};
pub use peer::PeerId;
pub use room::RoomId;
pub use session::SessionId;
pub use signaling::{
    Envelope, FrameAck, IceCandidate, MessageKind, MetricsPayload, SdpKind, SessionDescription,
    SignalMessage,
};
