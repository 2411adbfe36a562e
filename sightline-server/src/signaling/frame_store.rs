use bytes::Bytes;
use dashmap::DashMap;
use sightline_core::ClientId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

struct StoredFrame {
    data: Bytes,
    count: u64,
}

struct FrameStoreInner {
    frames: DashMap<ClientId, StoredFrame>,
    dir: Option<PathBuf>,
}

/// Latest uploaded frame per client, optionally mirrored to disk as
/// `<dir>/<client>/frame_<timestamp>.jpg`.
#[derive(Clone)]
pub struct FrameStore {
    inner: Arc<FrameStoreInner>,
}

impl FrameStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FrameStoreInner {
                frames: DashMap::new(),
                dir,
            }),
        }
    }

    /// Keeps `data` as the client's latest frame and returns its 1-based number.
    pub async fn store(
        &self,
        client_id: &ClientId,
        data: Bytes,
        timestamp: u64,
    ) -> std::io::Result<u64> {
        let frame_number = {
            let mut entry = self
                .inner
                .frames
                .entry(client_id.clone())
                .or_insert_with(|| StoredFrame {
                    data: Bytes::new(),
                    count: 0,
                });
            entry.count += 1;
            entry.data = data.clone();
            entry.count
        };

        if let Some(dir) = &self.inner.dir {
            let path = frame_path(dir, client_id, timestamp);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &data).await?;
            debug!("Saved frame {} to {}", frame_number, path.display());
        }
        Ok(frame_number)
    }

    pub fn latest(&self, client_id: &ClientId) -> Option<Bytes> {
        self.inner
            .frames
            .get(client_id)
            .map(|frame| frame.data.clone())
    }

    pub fn frame_count(&self, client_id: &ClientId) -> u64 {
        self.inner.frames.get(client_id).map_or(0, |frame| frame.count)
    }
}

/// Client ids come from request headers, so they never become more than one
/// path component.
fn frame_path(dir: &Path, client_id: &ClientId, timestamp: u64) -> PathBuf {
    let folder: String = client_id
        .as_str()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(folder).join(format!("frame_{timestamp}.jpg"))
}
