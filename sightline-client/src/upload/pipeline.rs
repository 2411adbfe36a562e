use crate::error::UploadError;
use crate::upload::capture::{CaptureLimits, encode_frame};
use crate::upload::quality::{QualityConfig, QualityController};
use crate::upload::rate_limiter::RateLimiter;
use crate::upload::uploader::FrameUploader;
use bytes::Bytes;
use image::DynamicImage;
use parking_lot::Mutex;
use sightline_core::{ClientId, FrameAck};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_uploads_per_second: usize,
    pub min_frame_interval: Duration,
    pub quality: QualityConfig,
    pub limits: CaptureLimits,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_uploads_per_second: 30,
            min_frame_interval: Duration::from_millis(100),
            quality: QualityConfig::default(),
            limits: CaptureLimits::default(),
        }
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    /// Shed by the debounce check; never queued.
    Dropped,
    Uploaded(FrameAck),
    Failed(UploadError),
}

impl UploadOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: u64,
    pub failed: u64,
    pub dropped: u64,
}

struct UploadTask {
    id: u64,
    frame: Bytes,
    client_id: ClientId,
    enqueued_at: Instant,
    result: oneshot::Sender<UploadOutcome>,
}

#[derive(Default)]
struct Counters {
    uploaded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

struct PipelineInner {
    config: UploadConfig,
    queue: Mutex<Option<mpsc::UnboundedSender<UploadTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_accepted: Mutex<Option<Instant>>,
    quality: Mutex<QualityController>,
    next_id: AtomicU64,
    counters: Counters,
}

/// Serial, rate-limited frame uploader with adaptive JPEG quality.
#[derive(Clone)]
pub struct FrameUploadPipeline {
    inner: Arc<PipelineInner>,
}

impl FrameUploadPipeline {
    /// Starts the upload worker on the current tokio runtime.
    pub fn new(config: UploadConfig, uploader: Arc<dyn FrameUploader>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(PipelineInner {
            quality: Mutex::new(QualityController::new(config.quality)),
            config,
            queue: Mutex::new(Some(queue_tx)),
            worker: Mutex::new(None),
            last_accepted: Mutex::new(None),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        });

        let worker = tokio::spawn(run_worker(inner.clone(), queue_rx, uploader));
        *inner.worker.lock() = Some(worker);

        Self { inner }
    }

    /// Queues a compressed frame and resolves once it is uploaded, failed or shed.
    pub async fn upload_frame(&self, frame: Bytes, client_id: ClientId) -> UploadOutcome {
        let now = Instant::now();
        {
            let mut last = self.inner.last_accepted.lock();
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.inner.config.min_frame_interval {
                    self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    return UploadOutcome::Dropped;
                }
            }
            *last = Some(now);
        }

        let (result, outcome) = oneshot::channel();
        let task = UploadTask {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            frame,
            client_id,
            enqueued_at: now,
            result,
        };

        let queued = match self.inner.queue.lock().as_ref() {
            Some(queue) => queue.send(task).is_ok(),
            None => false,
        };
        if !queued {
            return UploadOutcome::Failed(UploadError::Closed);
        }

        outcome
            .await
            .unwrap_or(UploadOutcome::Failed(UploadError::Closed))
    }

    /// Resizes and JPEG-encodes a captured frame at the current quality.
    pub fn capture(&self, image: &DynamicImage) -> Result<Bytes, UploadError> {
        let quality = self.quality();
        Ok(encode_frame(image, self.inner.config.limits, quality)?)
    }

    /// Current quality in percent.
    pub fn quality(&self) -> u8 {
        self.inner.quality.lock().current()
    }

    pub fn stats(&self) -> UploadStats {
        let counters = &self.inner.counters;
        UploadStats {
            uploaded: counters.uploaded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stops the worker; queued and in-flight tasks resolve as failed. Idempotent.
    pub fn close(&self) {
        self.inner.queue.lock().take();
        if let Some(worker) = self.inner.worker.lock().take() {
            worker.abort();
            info!("Frame upload pipeline closed");
        }
    }
}

async fn run_worker(
    inner: Arc<PipelineInner>,
    mut queue: mpsc::UnboundedReceiver<UploadTask>,
    uploader: Arc<dyn FrameUploader>,
) {
    let mut limiter = RateLimiter::per_second(inner.config.max_uploads_per_second);

    while let Some(task) = queue.recv().await {
        limiter.acquire().await;
        let waited = task.enqueued_at.elapsed();

        let outcome = match uploader.upload(task.frame, &task.client_id).await {
            Ok(ack) => {
                let quality = inner.quality.lock().record_success();
                inner.counters.uploaded.fetch_add(1, Ordering::Relaxed);
                debug!(task = task.id, ?waited, quality, "Frame uploaded");
                UploadOutcome::Uploaded(ack)
            }
            Err(e) => {
                let quality = inner.quality.lock().record_failure();
                inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(task = task.id, quality, "Frame upload failed: {}", e);
                UploadOutcome::Failed(e)
            }
        };

        let _ = task.result.send(outcome);
    }
}
