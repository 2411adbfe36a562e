mod capture;
mod pipeline;
mod quality;
mod rate_limiter;
mod uploader;

pub use capture::{CaptureLimits, encode_frame};
pub use pipeline::{FrameUploadPipeline, UploadConfig, UploadOutcome, UploadStats};
pub use quality::{QualityConfig, QualityController};
pub use rate_limiter::RateLimiter;
pub use uploader::{CLIENT_ID_HEADER, FrameUploader, HttpFrameUploader};
