use crate::media::error::MediaError;
use crate::media::router::RouterInfo;
use sightline_core::{MediaCodec, TransportOptions};
use tokio::sync::oneshot;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, MediaError>>;

/// Requests a media worker serves on its own thread.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    CreateRouter {
        codecs: Vec<MediaCodec>,
        reply: Reply<RouterInfo>,
    },
    CreateTransport {
        router_id: String,
        reply: Reply<TransportOptions>,
    },
    CloseTransport {
        router_id: String,
        transport_id: String,
    },
    CloseRouter {
        router_id: String,
    },
    /// Ends the worker loop; the worker is then reported dead.
    Stop,
}
