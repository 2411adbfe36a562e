use crate::model::client::ClientId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickle ICE candidate in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub frame_count: u64,
    pub fps: f64,
    #[serde(default)]
    pub duration_ms: u64,
    pub is_streaming: bool,
}

/// JSON acknowledgment returned by `POST /frame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAck {
    pub status: String,
    pub client_id: ClientId,
    pub frame_number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    #[serde(rename = "offer")]
    Offer { offer: SessionDescription },
    #[serde(rename = "answer")]
    Answer { answer: SessionDescription },
    #[serde(rename = "ice-candidate")]
    IceCandidate { candidate: IceCandidate },
    /// Base64 JPEG payload.
    #[serde(rename = "frame")]
    Frame {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
    #[serde(rename = "metrics_update")]
    MetricsUpdate { metrics: MetricsPayload },
    #[serde(rename = "client_info")]
    ClientInfo {
        client_id: ClientId,
        display_name: String,
    },
    #[serde(rename = "ping")]
    Ping { timestamp: u64 },
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
    #[serde(rename = "streaming_status")]
    StreamingStatus { is_streaming: bool },
    #[serde(rename = "client_disconnect")]
    ClientDisconnect,
    #[serde(rename = "error")]
    Error { message: String },
}

impl SignalMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SignalMessage::Offer { .. } => MessageKind::Offer,
            SignalMessage::Answer { .. } => MessageKind::Answer,
            SignalMessage::IceCandidate { .. } => MessageKind::IceCandidate,
            SignalMessage::Frame { .. } => MessageKind::Frame,
            SignalMessage::MetricsUpdate { .. } => MessageKind::MetricsUpdate,
            SignalMessage::ClientInfo { .. } => MessageKind::ClientInfo,
            SignalMessage::Ping { .. } => MessageKind::Ping,
            SignalMessage::Pong { .. } => MessageKind::Pong,
            SignalMessage::StreamingStatus { .. } => MessageKind::StreamingStatus,
            SignalMessage::ClientDisconnect => MessageKind::ClientDisconnect,
            SignalMessage::Error { .. } => MessageKind::Error,
        }
    }
}

/// Discriminant of [`SignalMessage`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Offer,
    Answer,
    IceCandidate,
    Frame,
    MetricsUpdate,
    ClientInfo,
    Ping,
    Pong,
    StreamingStatus,
    ClientDisconnect,
    Error,
}

impl MessageKind {
    pub const ALL: [MessageKind; 11] = [
        MessageKind::Offer,
        MessageKind::Answer,
        MessageKind::IceCandidate,
        MessageKind::Frame,
        MessageKind::MetricsUpdate,
        MessageKind::ClientInfo,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::StreamingStatus,
        MessageKind::ClientDisconnect,
        MessageKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::IceCandidate => "ice-candidate",
            MessageKind::Frame => "frame",
            MessageKind::MetricsUpdate => "metrics_update",
            MessageKind::ClientInfo => "client_info",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::StreamingStatus => "streaming_status",
            MessageKind::ClientDisconnect => "client_disconnect",
            MessageKind::Error => "error",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Kinds the server forwards only to the peer named in `targetId`.
    pub fn is_addressed(self) -> bool {
        matches!(
            self,
            MessageKind::Offer | MessageKind::Answer | MessageKind::IceCandidate
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire envelope: `{type, clientId?, targetId?, ...payload}`.
///
/// `client_id` names the sender (or the subject of a server notice),
/// `target_id` the addressee of a relayed negotiation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ClientId>,
    #[serde(flatten)]
    pub message: SignalMessage,
}

impl Envelope {
    pub fn new(message: SignalMessage) -> Self {
        Self {
            client_id: None,
            target_id: None,
            message,
        }
    }

    pub fn from_client(client_id: ClientId, message: SignalMessage) -> Self {
        Self {
            client_id: Some(client_id),
            target_id: None,
            message,
        }
    }

    pub fn with_target(mut self, target: ClientId) -> Self {
        self.target_id = Some(target);
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an inbound text frame.
    ///
    /// Returns `Ok(None)` for a well-formed message whose `type` is not
    /// recognised, and `Err` for anything malformed.
    pub fn parse(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(tag) = value.get("type").and_then(serde_json::Value::as_str) {
            if MessageKind::parse(tag).is_none() {
                return Ok(None);
            }
        }
        serde_json::from_value(value).map(Some)
    }
}
