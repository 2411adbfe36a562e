use sightline_core::{Envelope, MessageKind, SignalMessage};
use std::time::Duration;

use crate::integration::{connect_client, init_tracing};
use crate::utils::{spawn_server, test_config};

#[tokio::test]
async fn test_silent_stream_is_flipped_by_monitor() {
    init_tracing();
    let mut config = test_config(1);
    config.stream_timeout = Duration::from_millis(300);
    config.monitor_interval = Duration::from_millis(50);
    let server = spawn_server(config).await.expect("Failed to start server");

    let mut camera = connect_client(&server, "camera").await;
    let mut viewer = connect_client(&server, "viewer").await;

    camera
        .send(&Envelope::new(SignalMessage::Frame {
            content: "AAAA".to_owned(),
            timestamp: None,
        }))
        .await
        .expect("Failed to send frame");
    viewer
        .recv_kind(MessageKind::StreamingStatus, 2000)
        .await
        .expect("Stream never started");

    let stopped = viewer
        .recv_kind(MessageKind::StreamingStatus, 2000)
        .await
        .expect("Stream never timed out");
    assert_eq!(stopped.client_id.as_ref(), Some(&camera.client_id));
    assert_eq!(
        stopped.message,
        SignalMessage::StreamingStatus {
            is_streaming: false
        }
    );
    assert!(!server.state.signaling.is_streaming(&camera.client_id));
}
