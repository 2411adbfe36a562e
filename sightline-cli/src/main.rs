use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use sightline_client::{
    Endpoint, FrameUploadPipeline, HttpFrameUploader, UploadConfig, UploadOutcome,
};
use sightline_core::{ClientId, HealthReport, HealthStatus};
use sightline_server::{MediaConfig, ServerConfig, SightlineServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const WORKER_DEATH_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "sightline", version, about = "Realtime media signaling and streaming server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay, frame ingest and media allocator.
    Serve {
        #[arg(long, env = "SIGHTLINE_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, env = "SIGHTLINE_PORT", default_value_t = 8000)]
        port: u16,

        /// Media worker threads; defaults to the number of CPUs.
        #[arg(short, long, env = "SIGHTLINE_WORKERS")]
        workers: Option<usize>,

        /// Persist uploaded frames under this directory.
        #[arg(long, env = "SIGHTLINE_FRAMES_DIR")]
        frames_dir: Option<PathBuf>,

        /// Seconds without a frame before a stream counts as stopped.
        #[arg(long, env = "SIGHTLINE_STREAM_TIMEOUT", default_value_t = 5)]
        stream_timeout: u64,

        /// STUN/TURN urls handed to media transports.
        #[arg(long = "ice-server", env = "SIGHTLINE_ICE_SERVERS", value_delimiter = ',')]
        ice_servers: Vec<String>,
    },

    /// Query a running server's health endpoint.
    Probe {
        #[arg(long, env = "SIGHTLINE_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, env = "SIGHTLINE_PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Upload an image file as a burst of frames.
    Upload {
        image: PathBuf,

        #[arg(long, env = "SIGHTLINE_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, env = "SIGHTLINE_PORT", default_value_t = 8000)]
        port: u16,

        #[arg(long, default_value = "default")]
        client_id: String,

        #[arg(short = 'n', long, default_value_t = 10)]
        count: u32,

        /// Delay between frames in milliseconds.
        #[arg(long, default_value_t = 200)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            host,
            port,
            workers,
            frames_dir,
            stream_timeout,
            ice_servers,
        } => {
            let mut media = MediaConfig {
                ice_servers,
                ..MediaConfig::default()
            };
            if let Some(workers) = workers {
                media.num_workers = workers;
            }
            let config = ServerConfig {
                host,
                port,
                frames_dir,
                stream_timeout: Duration::from_secs(stream_timeout),
                media,
                ..ServerConfig::default()
            };
            serve(config).await
        }
        Commands::Probe { host, port } => probe(Endpoint::new(host, port)).await,
        Commands::Upload {
            image,
            host,
            port,
            client_id,
            count,
            interval,
        } => {
            upload(
                Endpoint::new(host, port),
                image,
                ClientId::from(client_id),
                count,
                Duration::from_millis(interval),
            )
            .await
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let mut server = SightlineServer::bind(config).await?;
    let mut deaths = server
        .take_worker_deaths()
        .context("Worker death channel already taken")?;
    let addr = server.local_addr()?;

    println!("{}", "🚀 Sightline server started".green().bold());
    println!("   📡 Signaling: ws://{}/ws", addr);
    println!("   🖼  Frames:    http://{}/frame", addr);
    println!("   ❤️  Health:    http://{}/health", addr);

    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        joined = &mut server_task => {
            joined.context("Server task panicked")?
        }
        Some(death) = deaths.recv() => {
            error!(
                "Media worker {} died ({}), exiting in {:?}",
                death.worker, death.reason, WORKER_DEATH_GRACE
            );
            tokio::time::sleep(WORKER_DEATH_GRACE).await;
            std::process::exit(1);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            server_task.abort();
            Ok(())
        }
    }
}

async fn probe(endpoint: Endpoint) -> Result<()> {
    let url = endpoint.http_url("/health")?;
    let report: HealthReport = reqwest::get(url.clone())
        .await
        .with_context(|| format!("Failed to reach {url}"))?
        .error_for_status()?
        .json()
        .await
        .context("Invalid health response")?;

    let status = match report.status {
        HealthStatus::Healthy => "healthy".green().bold(),
        HealthStatus::Degraded => "degraded".yellow().bold(),
        HealthStatus::Error => "error".red().bold(),
    };
    println!("Status:    {}", status);
    println!("Clients:   {}", report.websocket_clients);
    println!("Workers:   {}/{}", report.workers_alive, report.workers_total);
    println!("Uptime:    {}s", report.uptime_seconds);

    if report.status != HealthStatus::Healthy {
        bail!("server is {:?}", report.status);
    }
    Ok(())
}

async fn upload(
    endpoint: Endpoint,
    path: PathBuf,
    client_id: ClientId,
    count: u32,
    interval: Duration,
) -> Result<()> {
    let image = image::open(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let uploader = HttpFrameUploader::new(endpoint.http_url("/frame")?)?;
    let pipeline = FrameUploadPipeline::new(UploadConfig::default(), Arc::new(uploader));

    println!(
        "{}",
        format!("📦 Uploading {} frames as {}", count, client_id).cyan()
    );
    for _ in 0..count {
        let frame = pipeline.capture(&image)?;
        match pipeline.upload_frame(frame, client_id.clone()).await {
            UploadOutcome::Uploaded(ack) => println!(
                "   {} frame {} (quality {}%)",
                "✔".green(),
                ack.frame_number,
                pipeline.quality()
            ),
            UploadOutcome::Dropped => println!("   {} dropped by debounce", "•".yellow()),
            UploadOutcome::Failed(e) => println!("   {} {}", "✘".red(), e),
        }
        tokio::time::sleep(interval).await;
    }
    pipeline.close();

    let stats = pipeline.stats();
    println!(
        "{}",
        format!(
            "✨ Done: {} uploaded, {} failed, {} dropped",
            stats.uploaded, stats.failed, stats.dropped
        )
        .green()
        .bold()
    );
    Ok(())
}
