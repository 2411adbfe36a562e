use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCodec {
    pub kind: MediaKind,
    pub mime_type: String,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl MediaCodec {
    pub fn opus() -> Self {
        Self {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_owned(),
            clock_rate: 48_000,
            channels: Some(2),
            parameters: BTreeMap::new(),
        }
    }

    pub fn vp8() -> Self {
        Self {
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_owned(),
            clock_rate: 90_000,
            channels: None,
            parameters: BTreeMap::from([("x-google-start-bitrate".to_owned(), "1000".to_owned())]),
        }
    }

    pub fn h264() -> Self {
        Self {
            kind: MediaKind::Video,
            mime_type: "video/H264".to_owned(),
            clock_rate: 90_000,
            channels: None,
            parameters: BTreeMap::from([
                ("packetization-mode".to_owned(), "1".to_owned()),
                ("profile-level-id".to_owned(), "4d0032".to_owned()),
                ("level-asymmetry-allowed".to_owned(), "1".to_owned()),
                ("x-google-start-bitrate".to_owned(), "1000".to_owned()),
            ]),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::opus(), Self::vp8(), Self::h264()]
    }
}

/// Codec set a router accepts; handed to peers so they can build compatible offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpCapabilities {
    pub codecs: Vec<MediaCodec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    pub username_fragment: String,
    pub password: String,
    pub ice_lite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInfo {
    pub foundation: String,
    pub priority: u32,
    pub ip: String,
    pub protocol: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    Auto,
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    pub algorithm: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsParameters {
    pub role: DtlsRole,
    pub fingerprints: Vec<DtlsFingerprint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub id: String,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidateInfo>,
    pub dtls_parameters: DtlsParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: RoomId,
    pub peer_id: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub router_rtp_capabilities: RtpCapabilities,
    pub transport_options: TransportOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Ordered max-bitrate tiers for outbound video, in bits per second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct BitrateLadder {
    tiers: Vec<u32>,
}

impl BitrateLadder {
    /// Tiers are sorted and deduplicated; an empty list falls back to the default ladder.
    pub fn new(mut tiers: Vec<u32>) -> Self {
        tiers.sort_unstable();
        tiers.dedup();
        if tiers.is_empty() {
            return Self::default();
        }
        Self { tiers }
    }

    pub fn tiers(&self) -> &[u32] {
        &self.tiers
    }

    pub fn lowest(&self) -> u32 {
        self.tiers[0]
    }

    pub fn highest(&self) -> u32 {
        self.tiers[self.tiers.len() - 1]
    }

    /// Highest tier that fits the estimate, never below the lowest tier.
    pub fn tier_for(&self, available_bps: u64) -> u32 {
        self.tiers
            .iter()
            .rev()
            .copied()
            .find(|tier| u64::from(*tier) <= available_bps)
            .unwrap_or_else(|| self.lowest())
    }
}

impl From<Vec<u32>> for BitrateLadder {
    fn from(tiers: Vec<u32>) -> Self {
        Self::new(tiers)
    }
}

impl From<BitrateLadder> for Vec<u32> {
    fn from(ladder: BitrateLadder) -> Self {
        ladder.tiers
    }
}

impl Default for BitrateLadder {
    fn default() -> Self {
        Self {
            tiers: vec![100_000, 300_000, 900_000],
        }
    }
}
