use sightline_core::MediaKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Local outbound track fed by the capture source.
///
/// The capture side writes samples into [`MediaTrack::rtc_track`] and
/// follows [`MediaTrack::watch_max_bitrate`] to stay under the cap chosen
/// from the bitrate ladder.
pub struct MediaTrack {
    id: String,
    kind: MediaKind,
    rtc: Arc<TrackLocalStaticSample>,
    stopped: AtomicBool,
    max_bitrate: watch::Sender<Option<u32>>,
}

impl MediaTrack {
    pub fn video(id: impl Into<String>, stream_id: impl Into<String>) -> Arc<Self> {
        Self::new(MediaKind::Video, MIME_TYPE_VP8, 90_000, 0, id.into(), stream_id.into())
    }

    pub fn audio(id: impl Into<String>, stream_id: impl Into<String>) -> Arc<Self> {
        Self::new(MediaKind::Audio, MIME_TYPE_OPUS, 48_000, 2, id.into(), stream_id.into())
    }

    fn new(
        kind: MediaKind,
        mime_type: &str,
        clock_rate: u32,
        channels: u16,
        id: String,
        stream_id: String,
    ) -> Arc<Self> {
        let codec = RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            clock_rate,
            channels,
            ..Default::default()
        };
        let rtc = Arc::new(TrackLocalStaticSample::new(codec, id.clone(), stream_id));
        let (max_bitrate, _) = watch::channel(None);

        Arc::new(Self {
            id,
            kind,
            rtc,
            stopped: AtomicBool::new(false),
            max_bitrate,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        self.rtc.clone()
    }

    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Stopped local {:?} track {}", self.kind, self.id);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn set_max_bitrate(&self, bps: u32) {
        self.max_bitrate.send_replace(Some(bps));
    }

    pub fn max_bitrate(&self) -> Option<u32> {
        *self.max_bitrate.borrow()
    }

    pub fn watch_max_bitrate(&self) -> watch::Receiver<Option<u32>> {
        self.max_bitrate.subscribe()
    }
}
