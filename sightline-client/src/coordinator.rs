use crate::error::ChannelError;
use crate::registry::{RegistryConfig, StreamRegistry};
use crate::session::SessionInput;
use crate::signaling::{SignalingChannel, SignalingOutput};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use parking_lot::Mutex;
use sightline_core::{Envelope, MessageKind, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Owns one signaling channel and the registry it feeds.
///
/// Inbound stream events update the registry; negotiation messages are
/// queued for a peer session.
pub struct StreamingSession {
    channel: SignalingChannel,
    registry: StreamRegistry,
    negotiation: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingSession {
    pub fn new(channel: SignalingChannel, registry_config: RegistryConfig) -> Self {
        let output: Arc<dyn SignalingOutput> = Arc::new(channel.clone());
        let registry = StreamRegistry::with_signaling(registry_config, output);
        let (negotiation_tx, negotiation_rx) = mpsc::unbounded_channel();

        wire_registry(&channel, &registry);

        for kind in [MessageKind::Offer, MessageKind::Answer, MessageKind::IceCandidate] {
            let tx = negotiation_tx.clone();
            channel.on_message(kind, move |envelope| {
                let _ = tx.send(envelope.clone());
            });
        }

        channel.on_message(MessageKind::Error, |envelope| {
            if let SignalMessage::Error { message } = &envelope.message {
                warn!("Signaling server reported an error: {}", message);
            }
        });

        Self {
            channel,
            registry,
            negotiation: Mutex::new(Some(negotiation_rx)),
            forwarder: Mutex::new(None),
        }
    }

    pub async fn connect(&self, endpoint: &Url) -> Result<(), ChannelError> {
        self.channel.connect(endpoint).await
    }

    pub fn channel(&self) -> &SignalingChannel {
        &self.channel
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn signaling_output(&self) -> Arc<dyn SignalingOutput> {
        Arc::new(self.channel.clone())
    }

    /// Takes the queue of inbound `offer`/`answer`/`ice-candidate` envelopes.
    pub fn take_negotiation_inbox(&self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.negotiation.lock().take()
    }

    /// Forwards negotiation messages into a running peer session.
    pub fn route_negotiation_to(&self, inputs: mpsc::Sender<SessionInput>) -> bool {
        let Some(mut inbox) = self.take_negotiation_inbox() else {
            return false;
        };
        let task = tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                if inputs.send(SessionInput::Signal(envelope)).await.is_err() {
                    debug!("Peer session gone, negotiation forwarding stopped");
                    break;
                }
            }
        });
        *self.forwarder.lock() = Some(task);
        true
    }

    /// Publishes a captured JPEG to other clients and records it locally.
    pub fn send_frame(&self, jpeg: Bytes) -> bool {
        let content = STANDARD.encode(&jpeg);
        let sent = self.channel.send(Envelope::new(SignalMessage::Frame {
            content,
            timestamp: None,
        }));
        self.registry.update_local_stream(true, Some(jpeg));
        sent
    }

    pub fn stop_streaming(&self) {
        self.registry.update_local_stream(false, None);
    }

    /// Disconnects the channel and empties the registry. Idempotent.
    pub fn close(&self) {
        self.channel.disconnect();
        self.registry.clear_streams();
        if let Some(task) = self.forwarder.lock().take() {
            task.abort();
        }
    }
}

fn wire_registry(channel: &SignalingChannel, registry: &StreamRegistry) {
    let r = registry.clone();
    channel.on_message(MessageKind::ClientInfo, move |envelope| {
        if let SignalMessage::ClientInfo {
            client_id,
            display_name,
        } = &envelope.message
        {
            r.initialize_client(client_id.clone(), display_name, true);
        }
    });

    let r = registry.clone();
    channel.on_message(MessageKind::Frame, move |envelope| {
        let (Some(sender), SignalMessage::Frame { content, .. }) =
            (&envelope.client_id, &envelope.message)
        else {
            return;
        };
        match STANDARD.decode(content) {
            Ok(frame) => r.update_client_frame(sender, Bytes::from(frame)),
            Err(e) => warn!("Dropping undecodable frame from {}: {}", sender, e),
        }
    });

    let r = registry.clone();
    channel.on_message(MessageKind::MetricsUpdate, move |envelope| {
        if let (Some(subject), SignalMessage::MetricsUpdate { metrics }) =
            (&envelope.client_id, &envelope.message)
        {
            r.apply_remote_metrics(subject, metrics);
        }
    });

    let r = registry.clone();
    channel.on_message(MessageKind::StreamingStatus, move |envelope| {
        if let (Some(subject), SignalMessage::StreamingStatus { is_streaming }) =
            (&envelope.client_id, &envelope.message)
        {
            r.handle_streaming_status(subject, *is_streaming);
        }
    });

    let r = registry.clone();
    channel.on_message(MessageKind::ClientDisconnect, move |envelope| {
        if let Some(subject) = &envelope.client_id {
            r.remove_client(subject);
        }
    });
}
