use crate::error::UploadError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use sightline_core::{ClientId, FrameAck};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const CLIENT_ID_HEADER: &str = "X-Client-ID";

/// Request/response channel that carries one compressed frame.
#[async_trait]
pub trait FrameUploader: Send + Sync {
    async fn upload(&self, frame: Bytes, client_id: &ClientId) -> Result<FrameAck, UploadError>;
}

/// Posts frames as `multipart/form-data` to the server's `/frame` route.
#[derive(Debug, Clone)]
pub struct HttpFrameUploader {
    client: reqwest::Client,
    url: Url,
}

impl HttpFrameUploader {
    pub fn new(url: Url) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl FrameUploader for HttpFrameUploader {
    async fn upload(&self, frame: Bytes, client_id: &ClientId) -> Result<FrameAck, UploadError> {
        let size = frame.len();
        let part = Part::bytes(frame.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("frame", part);

        let response = self
            .client
            .post(self.url.clone())
            .header(CLIENT_ID_HEADER, client_id.as_str())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }

        let ack: FrameAck = response.json().await?;
        debug!("Uploaded {} byte frame #{} for {}", size, ack.frame_number, client_id);
        Ok(ack)
    }
}
