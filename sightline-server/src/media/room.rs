use crate::media::media_router::RouterHandle;
use sightline_core::{PeerId, RoomId};
use std::collections::HashMap;

/// A room is one router plus the transport each joined peer holds on it.
pub(crate) struct MediaRoom {
    pub id: RoomId,
    pub router: RouterHandle,
    peers: HashMap<PeerId, String>,
}

impl MediaRoom {
    pub fn new(id: RoomId, router: RouterHandle) -> Self {
        Self {
            id,
            router,
            peers: HashMap::new(),
        }
    }

    /// Records the peer's transport, returning the one it replaces.
    pub fn attach(&mut self, peer: PeerId, transport_id: String) -> Option<String> {
        self.peers.insert(peer, transport_id)
    }

    pub fn detach(&mut self, peer: &PeerId) -> Option<String> {
        self.peers.remove(peer)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn transport_ids(&self) -> impl Iterator<Item = &String> {
        self.peers.values()
    }
}
