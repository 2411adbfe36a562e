use crate::media::transport::WebRtcTransport;
use sightline_core::{MediaCodec, RtpCapabilities};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct RouterInfo {
    pub id: String,
    pub rtp_capabilities: RtpCapabilities,
}

/// Codec set plus the transports opened against it. Lives on one worker.
pub(crate) struct Router {
    id: String,
    rtp_capabilities: RtpCapabilities,
    transports: HashMap<String, WebRtcTransport>,
}

impl Router {
    pub fn new(codecs: Vec<MediaCodec>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rtp_capabilities: RtpCapabilities { codecs },
            transports: HashMap::new(),
        }
    }

    pub fn info(&self) -> RouterInfo {
        RouterInfo {
            id: self.id.clone(),
            rtp_capabilities: self.rtp_capabilities.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn insert(&mut self, transport: WebRtcTransport) {
        self.transports.insert(transport.id().to_owned(), transport);
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    pub async fn close_transport(&mut self, transport_id: &str) -> bool {
        match self.transports.remove(transport_id) {
            Some(transport) => {
                transport.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn close(mut self) {
        for (_, transport) in self.transports.drain() {
            transport.close().await;
        }
        info!("Router {} closed", self.id);
    }
}
