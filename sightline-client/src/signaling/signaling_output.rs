use sightline_core::{ClientId, Envelope, SignalMessage};

/// Outbound side of signaling as seen by sessions and the registry.
pub trait SignalingOutput: Send + Sync {
    /// Best-effort send; `false` when the message could not be queued.
    fn send(&self, envelope: Envelope) -> bool;

    /// Server-assigned id of this client, once known.
    fn local_id(&self) -> Option<ClientId>;

    fn send_to(&self, target: ClientId, message: SignalMessage) -> bool {
        self.send(Envelope::new(message).with_target(target))
    }

    fn broadcast(&self, message: SignalMessage) -> bool {
        self.send(Envelope::new(message))
    }
}
