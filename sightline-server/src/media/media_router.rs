use crate::config::MediaConfig;
use crate::media::error::MediaError;
use crate::media::room::MediaRoom;
use crate::media::transport::TransportSettings;
use crate::media::worker::{MediaWorker, WorkerDeath};
use crate::media::worker_command::WorkerCommand;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sightline_core::{JoinRoomResponse, MediaCodec, PeerId, RoomId, RtpCapabilities};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A router allocated on a specific worker.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    pub worker: usize,
    pub id: String,
    pub rtp_capabilities: RtpCapabilities,
}

struct MediaRouterInner {
    workers: Vec<MediaWorker>,
    next_worker: AtomicUsize,
    codecs: Vec<MediaCodec>,
    rooms: DashMap<RoomId, MediaRoom>,
}

/// Pool of media workers with round-robin router placement and the room table.
#[derive(Clone)]
pub struct MediaRouter {
    inner: Arc<MediaRouterInner>,
}

impl MediaRouter {
    /// Spawns `config.num_workers` workers.
    ///
    /// The receiver yields one [`WorkerDeath`] per worker that stops while
    /// the router is still in use.
    pub fn start(
        config: &MediaConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerDeath>), MediaError> {
        if config.num_workers == 0 {
            return Err(MediaError::NoWorkers);
        }
        let settings = TransportSettings {
            ice_servers: config.ice_servers.clone(),
            gather_timeout: config.ice_gather_timeout,
        };
        let (deaths_tx, deaths_rx) = mpsc::unbounded_channel();
        let workers = (0..config.num_workers)
            .map(|index| MediaWorker::spawn(index, settings.clone(), deaths_tx.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Started {} media workers", workers.len());

        let router = Self {
            inner: Arc::new(MediaRouterInner {
                workers,
                next_worker: AtomicUsize::new(0),
                codecs: config.codecs.clone(),
                rooms: DashMap::new(),
            }),
        };
        Ok((router, deaths_rx))
    }

    /// Allocates a router on the next worker in round-robin order.
    pub async fn create_router(&self) -> Result<RouterHandle, MediaError> {
        let worker = self.next_worker();
        let codecs = self.inner.codecs.clone();
        let info = worker
            .request(|reply| WorkerCommand::CreateRouter { codecs, reply })
            .await?;
        Ok(RouterHandle {
            worker: worker.index(),
            id: info.id,
            rtp_capabilities: info.rtp_capabilities,
        })
    }

    pub async fn create_room(&self, room_id: RoomId) -> Result<RtpCapabilities, MediaError> {
        if self.inner.rooms.contains_key(&room_id) {
            return Err(MediaError::RoomExists(room_id));
        }
        let router = self.create_router().await?;
        let capabilities = router.rtp_capabilities.clone();

        match self.inner.rooms.entry(room_id.clone()) {
            Entry::Occupied(_) => {
                self.release_router(&router);
                Err(MediaError::RoomExists(room_id))
            }
            Entry::Vacant(slot) => {
                info!(
                    "Room {} created on worker {} (router {})",
                    room_id, router.worker, router.id
                );
                slot.insert(MediaRoom::new(room_id, router));
                Ok(capabilities)
            }
        }
    }

    /// Opens a transport for `peer_id`; a repeated join replaces the old one.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        peer_id: PeerId,
    ) -> Result<JoinRoomResponse, MediaError> {
        let router = self
            .inner
            .rooms
            .get(room_id)
            .map(|room| room.router.clone())
            .ok_or_else(|| MediaError::RoomNotFound(room_id.clone()))?;
        let worker = self.worker(router.worker)?;

        let router_id = router.id.clone();
        let options = worker
            .request(|reply| WorkerCommand::CreateTransport { router_id, reply })
            .await?;

        let replaced = match self.inner.rooms.get_mut(room_id) {
            Some(mut room) => room.attach(peer_id.clone(), options.id.clone()),
            None => {
                worker.notify(WorkerCommand::CloseTransport {
                    router_id: router.id.clone(),
                    transport_id: options.id.clone(),
                });
                return Err(MediaError::RoomNotFound(room_id.clone()));
            }
        };
        if let Some(transport_id) = replaced {
            info!("Peer {} rejoined room {}, closing transport {}", peer_id, room_id, transport_id);
            worker.notify(WorkerCommand::CloseTransport {
                router_id: router.id.clone(),
                transport_id,
            });
        } else {
            info!("Peer {} joined room {}", peer_id, room_id);
        }

        Ok(JoinRoomResponse {
            router_rtp_capabilities: router.rtp_capabilities,
            transport_options: options,
        })
    }

    pub fn leave_room(&self, room_id: &RoomId, peer_id: &PeerId) -> bool {
        let Some((router, transport_id)) = self
            .inner
            .rooms
            .get_mut(room_id)
            .and_then(|mut room| {
                let router = room.router.clone();
                room.detach(peer_id).map(|t| (router, t))
            })
        else {
            return false;
        };
        if let Ok(worker) = self.worker(router.worker) {
            worker.notify(WorkerCommand::CloseTransport {
                router_id: router.id,
                transport_id,
            });
        }
        info!("Peer {} left room {}", peer_id, room_id);
        true
    }

    /// Closes the room's router and every transport on it.
    pub fn close_room(&self, room_id: &RoomId) -> bool {
        let Some((_, room)) = self.inner.rooms.remove(room_id) else {
            return false;
        };
        info!(
            "Closing room {} with {} peers",
            room.id,
            room.transport_ids().count()
        );
        self.release_router(&room.router);
        true
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn room_peers(&self, room_id: &RoomId) -> Option<usize> {
        self.inner.rooms.get(room_id).map(|room| room.peer_count())
    }

    /// Worker that hosts the room's router.
    pub fn room_worker(&self, room_id: &RoomId) -> Option<usize> {
        self.inner.rooms.get(room_id).map(|room| room.router.worker)
    }

    pub fn workers_total(&self) -> usize {
        self.inner.workers.len()
    }

    pub fn workers_alive(&self) -> usize {
        self.inner.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Stops one worker; it is then reported like any other dead worker.
    pub fn stop_worker(&self, index: usize) -> bool {
        match self.inner.workers.get(index) {
            Some(worker) if worker.is_alive() => {
                warn!("Stopping media worker {}", index);
                worker.notify(WorkerCommand::Stop);
                true
            }
            _ => false,
        }
    }

    fn next_worker(&self) -> &MediaWorker {
        let slot = self.inner.next_worker.fetch_add(1, Ordering::Relaxed);
        &self.inner.workers[slot % self.inner.workers.len()]
    }

    fn worker(&self, index: usize) -> Result<&MediaWorker, MediaError> {
        self.inner
            .workers
            .get(index)
            .ok_or(MediaError::WorkerUnavailable(index))
    }

    fn release_router(&self, router: &RouterHandle) {
        if let Ok(worker) = self.worker(router.worker) {
            worker.notify(WorkerCommand::CloseRouter {
                router_id: router.id.clone(),
            });
        }
    }
}
