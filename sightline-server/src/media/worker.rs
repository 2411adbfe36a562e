use crate::media::error::MediaError;
use crate::media::router::Router;
use crate::media::transport::{TransportSettings, WebRtcTransport};
use crate::media::worker_command::{Reply, WorkerCommand};
use sightline_core::TransportOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use webrtc::api::{API, APIBuilder};

/// Reported once when a media worker stops unexpectedly.
#[derive(Debug, Clone)]
pub struct WorkerDeath {
    pub worker: usize,
    pub reason: String,
}

/// Handle to a media worker thread.
#[derive(Clone)]
pub(crate) struct MediaWorker {
    index: usize,
    commands: mpsc::Sender<WorkerCommand>,
    alive: Arc<AtomicBool>,
}

impl MediaWorker {
    /// Starts the worker on a dedicated thread with its own runtime.
    pub fn spawn(
        index: usize,
        settings: TransportSettings,
        deaths: mpsc::UnboundedSender<WorkerDeath>,
    ) -> Result<Self, MediaError> {
        let (commands, rx) = mpsc::channel(100);
        let alive = Arc::new(AtomicBool::new(true));
        let mut guard = DeathGuard {
            index,
            alive: alive.clone(),
            deaths,
            reason: None,
            graceful: false,
        };

        std::thread::Builder::new()
            .name(format!("media-worker-{index}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        guard.reason = Some(format!("failed to build runtime: {e}"));
                        return;
                    }
                };
                let exit = runtime.block_on(WorkerActor::new(index, settings).run(rx));
                guard.reason = match exit {
                    WorkerExit::Drained => None,
                    WorkerExit::Stopped => Some("stopped on request".to_owned()),
                };
                guard.graceful = matches!(exit, WorkerExit::Drained);
            })?;

        Ok(Self {
            index,
            commands,
            alive,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Sends a command and waits for its reply.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> WorkerCommand,
    ) -> Result<T, MediaError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| MediaError::WorkerUnavailable(self.index))?;
        rx.await
            .map_err(|_| MediaError::WorkerUnavailable(self.index))?
    }

    /// Fire-and-forget command; dropped if the worker is gone or saturated.
    pub fn notify(&self, command: WorkerCommand) {
        if let Err(e) = self.commands.try_send(command) {
            warn!("Media worker {} did not accept command: {}", self.index, e);
        }
    }
}

enum WorkerExit {
    Drained,
    Stopped,
}

struct DeathGuard {
    index: usize,
    alive: Arc<AtomicBool>,
    deaths: mpsc::UnboundedSender<WorkerDeath>,
    reason: Option<String>,
    graceful: bool,
}

impl Drop for DeathGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if self.graceful {
            info!("Media worker {} shut down", self.index);
            return;
        }
        let reason = match self.reason.take() {
            Some(reason) => reason,
            None if std::thread::panicking() => "worker panicked".to_owned(),
            None => "worker exited".to_owned(),
        };
        error!("Media worker {} died: {}", self.index, reason);
        let _ = self.deaths.send(WorkerDeath {
            worker: self.index,
            reason,
        });
    }
}

struct WorkerActor {
    index: usize,
    api: API,
    settings: TransportSettings,
    routers: HashMap<String, Router>,
}

impl WorkerActor {
    fn new(index: usize, settings: TransportSettings) -> Self {
        Self {
            index,
            api: APIBuilder::new().build(),
            settings,
            routers: HashMap::new(),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<WorkerCommand>) -> WorkerExit {
        info!("Media worker {} started", self.index);

        while let Some(command) = commands.recv().await {
            match command {
                WorkerCommand::CreateRouter { codecs, reply } => {
                    let router = Router::new(codecs);
                    let info = router.info();
                    info!("Worker {} created router {}", self.index, info.id);
                    self.routers.insert(info.id.clone(), router);
                    let _ = reply.send(Ok(info));
                }
                WorkerCommand::CreateTransport { router_id, reply } => {
                    let result = self.create_transport(&router_id).await;
                    let _ = reply.send(result);
                }
                WorkerCommand::CloseTransport {
                    router_id,
                    transport_id,
                } => {
                    let Some(router) = self.routers.get_mut(&router_id) else {
                        continue;
                    };
                    router.close_transport(&transport_id).await;
                }
                WorkerCommand::CloseRouter { router_id } => {
                    if let Some(router) = self.routers.remove(&router_id) {
                        router.close().await;
                    }
                }
                WorkerCommand::Stop => {
                    self.close_all().await;
                    return WorkerExit::Stopped;
                }
            }
        }

        self.close_all().await;
        WorkerExit::Drained
    }

    async fn create_transport(&mut self, router_id: &str) -> Result<TransportOptions, MediaError> {
        let Some(router) = self.routers.get_mut(router_id) else {
            return Err(MediaError::RouterNotFound(router_id.to_owned()));
        };
        let (transport, options) = WebRtcTransport::create(&self.api, &self.settings).await?;
        info!(
            "Worker {} opened transport {} on router {} ({} total)",
            self.index,
            options.id,
            router_id,
            router.transport_count() + 1
        );
        router.insert(transport);
        Ok(options)
    }

    async fn close_all(&mut self) {
        for (_, router) in self.routers.drain() {
            router.close().await;
        }
    }
}
