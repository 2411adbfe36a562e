use crate::media::error::MediaError;
use sightline_core::{
    DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidateInfo, IceParameters, TransportOptions,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;
use webrtc::api::API;
use webrtc::dtls_transport::RTCDtlsTransport;
use webrtc::dtls_transport::dtls_role::DTLSRole;
use webrtc::ice_transport::RTCIceTransport;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_gatherer::{RTCIceGatherOptions, RTCIceGatherer};
use webrtc::ice_transport::ice_server::RTCIceServer;

#[derive(Debug, Clone)]
pub(crate) struct TransportSettings {
    pub ice_servers: Vec<String>,
    pub gather_timeout: Duration,
}

/// Server side of a peer's media path: ICE gatherer, ICE transport and
/// DTLS transport, built with the object API rather than SDP.
pub(crate) struct WebRtcTransport {
    id: String,
    gatherer: Arc<RTCIceGatherer>,
    ice: Arc<RTCIceTransport>,
    dtls: Arc<RTCDtlsTransport>,
}

impl WebRtcTransport {
    /// Gathers local candidates and returns the transport with the options a
    /// client needs to connect to it.
    pub async fn create(
        api: &API,
        settings: &TransportSettings,
    ) -> Result<(Self, TransportOptions), MediaError> {
        let ice_servers = if settings.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: settings.ice_servers.clone(),
                ..Default::default()
            }]
        };
        let gatherer = Arc::new(api.new_ice_gatherer(RTCIceGatherOptions {
            ice_servers,
            ..Default::default()
        })?);
        let ice = Arc::new(api.new_ice_transport(Arc::clone(&gatherer)));
        let dtls = Arc::new(api.new_dtls_transport(Arc::clone(&ice), vec![])?);

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let mut done_tx = Some(done_tx);
        gatherer.on_local_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            if c.is_none() {
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            }
            Box::pin(async {})
        }));

        gatherer.gather().await?;
        if tokio::time::timeout(settings.gather_timeout, done_rx)
            .await
            .is_err()
        {
            warn!(
                "ICE gathering not finished after {:?}, using partial candidates",
                settings.gather_timeout
            );
        }

        let ice_parameters = gatherer.get_local_parameters().await?;
        let candidates = gatherer.get_local_candidates().await?;
        let dtls_parameters = dtls.get_local_parameters()?;

        let transport = Self {
            id: Uuid::new_v4().to_string(),
            gatherer,
            ice,
            dtls,
        };
        debug!(
            "Transport {} gathered {} candidates",
            transport.id,
            candidates.len()
        );

        let options = TransportOptions {
            id: transport.id.clone(),
            ice_parameters: IceParameters {
                username_fragment: ice_parameters.username_fragment,
                password: ice_parameters.password,
                ice_lite: ice_parameters.ice_lite,
            },
            ice_candidates: candidates.iter().map(candidate_info).collect(),
            dtls_parameters: DtlsParameters {
                role: dtls_role(dtls_parameters.role),
                fingerprints: dtls_parameters
                    .fingerprints
                    .into_iter()
                    .map(|f| DtlsFingerprint {
                        algorithm: f.algorithm,
                        value: f.value,
                    })
                    .collect(),
            },
        };
        Ok((transport, options))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn close(&self) {
        if let Err(e) = self.dtls.stop().await {
            warn!("Failed to stop DTLS transport {}: {}", self.id, e);
        }
        if let Err(e) = self.ice.stop().await {
            warn!("Failed to stop ICE transport {}: {}", self.id, e);
        }
        if let Err(e) = self.gatherer.close().await {
            warn!("Failed to close ICE gatherer {}: {}", self.id, e);
        }
        debug!("Transport {} closed", self.id);
    }
}

fn candidate_info(c: &RTCIceCandidate) -> IceCandidateInfo {
    IceCandidateInfo {
        foundation: c.foundation.clone(),
        priority: c.priority,
        ip: c.address.clone(),
        protocol: c.protocol.to_string(),
        port: c.port,
        candidate_type: c.typ.to_string(),
    }
}

fn dtls_role(role: DTLSRole) -> DtlsRole {
    match role {
        DTLSRole::Client => DtlsRole::Client,
        DTLSRole::Server => DtlsRole::Server,
        _ => DtlsRole::Auto,
    }
}
