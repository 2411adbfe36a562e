mod backoff;
mod channel;
mod connector;
mod dispatch;
mod signaling_output;

pub use backoff::BackoffPolicy;
pub use channel::{ChannelConfig, SignalingChannel};
pub use connector::{Connector, Socket, TextSink, TextStream, WsConnector};
pub use dispatch::{Dispatcher, Handler};
pub use signaling_output::SignalingOutput;
