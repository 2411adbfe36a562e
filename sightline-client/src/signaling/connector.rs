use crate::error::ChannelError;
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;
use url::Url;

pub type TextSink = Pin<Box<dyn Sink<String, Error = ChannelError> + Send>>;
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

/// One open signaling socket, reduced to its text frames.
pub struct Socket {
    pub sink: TextSink,
    pub stream: TextStream,
}

impl Socket {
    pub fn new(
        sink: impl Sink<String, Error = ChannelError> + Send + 'static,
        stream: impl Stream<Item = Result<String, ChannelError>> + Send + 'static,
    ) -> Self {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

/// Opens sockets for a [`SignalingChannel`](super::SignalingChannel).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Socket, ChannelError>;
}

/// Websocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Socket, ChannelError> {
        let (ws, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        debug!("websocket handshake finished with status {}", response.status());

        let (sink, stream) = ws.split();

        let sink = sink
            .with(|text: String| future::ready(Ok::<_, WsError>(Message::text(text))))
            .sink_map_err(|e| ChannelError::Connect(e.to_string()));

        let stream = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(ChannelError::Connect(e.to_string()))),
            })
        });

        Ok(Socket::new(sink, stream))
    }
}
