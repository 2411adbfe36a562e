use bytes::Bytes;
use futures::future::join_all;
use sightline_client::{FrameUploadPipeline, UploadConfig};
use sightline_core::ClientId;
use std::sync::Arc;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::FakeUploader;

#[tokio::test(start_paused = true)]
async fn test_burst_is_capped_per_second() {
    init_tracing();

    let uploader = Arc::new(FakeUploader::new());
    let pipeline = FrameUploadPipeline::new(
        UploadConfig {
            min_frame_interval: Duration::ZERO,
            ..UploadConfig::default()
        },
        uploader.clone(),
    );

    let start = tokio::time::Instant::now();
    let client = ClientId::from("cam_0001");
    let outcomes = join_all(
        (0..40).map(|n| pipeline.upload_frame(Bytes::from(vec![n as u8; 16]), client.clone())),
    )
    .await;

    assert!(outcomes.iter().all(|o| o.is_uploaded()));

    let calls = uploader.calls();
    assert_eq!(calls.len(), 40);
    let first_second = calls
        .iter()
        .filter(|at| at.duration_since(start) < Duration::from_secs(1))
        .count();
    assert_eq!(first_second, 30);

    // No rolling one-second window ever holds more than 30 uploads.
    for (i, at) in calls.iter().enumerate() {
        let in_window = calls[i..]
            .iter()
            .filter(|later| later.duration_since(*at) < Duration::from_secs(1))
            .count();
        assert!(in_window <= 30);
    }

    pipeline.close();
}

#[tokio::test(start_paused = true)]
async fn test_uploads_are_serial_and_ordered() {
    init_tracing();

    let uploader = Arc::new(FakeUploader::new());
    let pipeline = FrameUploadPipeline::new(
        UploadConfig {
            min_frame_interval: Duration::ZERO,
            ..UploadConfig::default()
        },
        uploader.clone(),
    );

    let client = ClientId::from("cam_0001");
    let outcomes = join_all(
        (0..5).map(|_| pipeline.upload_frame(Bytes::from_static(b"jpeg"), client.clone())),
    )
    .await;

    let numbers: Vec<u64> = outcomes
        .into_iter()
        .map(|o| match o {
            sightline_client::UploadOutcome::Uploaded(ack) => ack.frame_number,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(pipeline.stats().uploaded, 5);
}
