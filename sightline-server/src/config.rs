use sightline_core::MediaCodec;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Uploaded frames are also written under this directory when set.
    pub frames_dir: Option<PathBuf>,
    /// A streaming client with no frame for this long is flipped to stopped.
    pub stream_timeout: Duration,
    pub monitor_interval: Duration,
    pub media: MediaConfig,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
            frames_dir: None,
            stream_timeout: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(1),
            media: MediaConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub num_workers: usize,
    pub ice_servers: Vec<String>,
    /// Upper bound on server-side ICE candidate gathering per transport.
    pub ice_gather_timeout: Duration,
    pub codecs: Vec<MediaCodec>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            ice_servers: Vec::new(),
            ice_gather_timeout: Duration::from_secs(3),
            codecs: MediaCodec::defaults(),
        }
    }
}
