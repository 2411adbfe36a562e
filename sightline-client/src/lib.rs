mod coordinator;
mod endpoint;
mod error;

pub mod registry;
pub mod session;
pub mod signaling;
pub mod upload;

pub use coordinator::StreamingSession;
pub use endpoint::Endpoint;
pub use error::{ChannelError, SessionError, UploadError};
pub use registry::{RegistryConfig, StreamClient, StreamMetrics, StreamRegistry};
pub use session::{
    MediaTrack, PeerSessionHandle, PeerSessionManager, PeerTransport, PeerTransportFactory,
    RtcTransportFactory, SessionConfig, SessionInput, SessionState,
};
pub use signaling::{BackoffPolicy, ChannelConfig, Connector, SignalingChannel, SignalingOutput};
pub use upload::{FrameUploadPipeline, FrameUploader, HttpFrameUploader, UploadConfig, UploadOutcome};
