use crate::config::ServerConfig;
use crate::http::{create_room, health, join_room, latest_frame, upload_frame};
use crate::media::{MediaRouter, WorkerDeath};
use crate::signaling::{FrameStore, SignalingService, spawn_stream_monitor, stats_handler, ws_handler};
use anyhow::Context;
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub signaling: SignalingService,
    pub media: MediaRouter,
    pub frames: FrameStore,
    pub started: Instant,
}

impl FromRef<AppState> for SignalingService {
    fn from_ref(state: &AppState) -> Self {
        state.signaling.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(stats_handler))
        .route("/frame", post(upload_frame))
        .route("/frame/{client_id}/latest", get(latest_frame))
        .route("/health", get(health))
        .route("/api/create-room", post(create_room))
        .route("/api/join-room", post(join_room))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Signaling relay, frame ingest and media allocator behind one listener.
pub struct SightlineServer {
    config: ServerConfig,
    listener: TcpListener,
    state: AppState,
    deaths: Option<mpsc::UnboundedReceiver<WorkerDeath>>,
}

impl SightlineServer {
    /// Starts the media workers and binds the listener; nothing is served
    /// until [`run`](Self::run).
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let (media, deaths) =
            MediaRouter::start(&config.media).context("Failed to start media workers")?;

        if let Some(dir) = &config.frames_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create frames directory {}", dir.display()))?;
        }

        let listener = TcpListener::bind(config.bind_addr())
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

        let state = AppState {
            signaling: SignalingService::new(config.stream_timeout),
            media,
            frames: FrameStore::new(config.frames_dir.clone()),
            started: Instant::now(),
        };

        Ok(Self {
            config,
            listener,
            state,
            deaths: Some(deaths),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Worker death notifications; available once.
    pub fn take_worker_deaths(&mut self) -> Option<mpsc::UnboundedReceiver<WorkerDeath>> {
        self.deaths.take()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        info!(
            "Sightline server listening on {} with {} media workers",
            addr,
            self.state.media.workers_total()
        );

        let monitor = spawn_stream_monitor(
            self.state.signaling.clone(),
            self.config.monitor_interval,
        );
        let result = axum::serve(self.listener, router(self.state)).await;
        monitor.abort();
        result.context("Server stopped unexpectedly")
    }
}
