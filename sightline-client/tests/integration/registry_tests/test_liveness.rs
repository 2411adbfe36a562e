use bytes::Bytes;
use sightline_client::{RegistryConfig, StreamRegistry};
use sightline_core::{ClientId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::MockSignalingOutput;

#[tokio::test(start_paused = true)]
async fn test_silent_remote_stream_times_out() {
    init_tracing();

    let registry = StreamRegistry::new(RegistryConfig::default());
    let remote = ClientId::from("porch_0badf00d");
    registry.update_client_frame(&remote, Bytes::from_static(b"jpeg"));
    assert_eq!(registry.streaming_clients_count(), 1);

    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert!(registry.client(&remote).unwrap().is_streaming);

    tokio::time::sleep(Duration::from_millis(1600)).await;
    let client = registry.client(&remote).expect("Timed out streams stay listed");
    assert!(!client.is_streaming);
    assert!(client.last_frame.is_none());
    assert_eq!(registry.streaming_clients_count(), 0);

    // A fresh frame brings it back.
    registry.update_client_frame(&remote, Bytes::from_static(b"jpeg"));
    assert!(registry.client(&remote).unwrap().is_streaming);
}

#[tokio::test(start_paused = true)]
async fn test_regular_frames_keep_stream_alive_and_update_fps() {
    init_tracing();

    let registry = StreamRegistry::new(RegistryConfig::default());
    let remote = ClientId::from("porch_0badf00d");

    for _ in 0..10 {
        registry.update_client_frame(&remote, Bytes::from_static(b"jpeg"));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    // Frames landed over 0.9s; the refresh at 2s sees 10 frames in 2s.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let client = registry.client(&remote).unwrap();
    assert!(client.is_streaming);
    assert_eq!(client.metrics.frame_count, 10);
    assert_eq!(client.metrics.fps, 5.0);
    assert_eq!(registry.stream_duration(&remote), Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn test_local_stream_never_times_out() {
    init_tracing();

    let registry = StreamRegistry::new(RegistryConfig::default());
    let me = ClientId::from("me_00000001");
    registry.initialize_client(me.clone(), "me", true);
    registry.update_local_stream(true, Some(Bytes::from_static(b"jpeg")));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(registry.client(&me).unwrap().is_streaming);
}

#[tokio::test]
async fn test_clients_list_puts_local_first() {
    init_tracing();

    let registry = StreamRegistry::new(RegistryConfig::default());
    registry.update_client_frame(&ClientId::from("aaa"), Bytes::from_static(b"f"));
    registry.initialize_client(ClientId::from("zzz"), "me", true);
    registry.update_client_frame(&ClientId::from("bbb"), Bytes::from_static(b"f"));

    let ids: Vec<String> = registry
        .clients_list()
        .into_iter()
        .map(|c| c.id.to_string())
        .collect();
    assert_eq!(ids, vec!["zzz", "aaa", "bbb"]);

    registry.clear_streams();
    assert!(registry.clients_list().is_empty());
    assert!(!registry.timers_running());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_producer_times_out_on_peers() {
    init_tracing();

    let producer_id = ClientId::from("cam_0000000a");
    let (signaling, mut outbox) = MockSignalingOutput::new(producer_id.clone());
    let producer = StreamRegistry::with_signaling(RegistryConfig::default(), Arc::new(signaling));
    let viewer = StreamRegistry::new(RegistryConfig::default());
    producer.initialize_client(producer_id.clone(), "cam", true);

    // Everything the producer broadcasts reaches the viewer.
    let relay = viewer.clone();
    let subject = producer_id.clone();
    tokio::spawn(async move {
        while let Some(envelope) = outbox.recv().await {
            match envelope.message {
                SignalMessage::MetricsUpdate { metrics } => {
                    relay.apply_remote_metrics(&subject, &metrics)
                }
                SignalMessage::StreamingStatus { is_streaming } => {
                    relay.handle_streaming_status(&subject, is_streaming)
                }
                _ => {}
            }
        }
    });

    producer.update_local_stream(true, Some(Bytes::from_static(b"jpeg")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(viewer.client(&producer_id).is_some_and(|c| c.is_streaming));

    // Capture stalls; the producer keeps its socket and its timers.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(producer.client(&producer_id).unwrap().is_streaming);

    let seen = viewer.client(&producer_id).expect("Viewer forgot the producer");
    assert!(!seen.is_streaming);
    assert_eq!(seen.metrics.frame_count, 0);
    assert_eq!(viewer.streaming_clients_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_registry_does_not_bump_version() {
    init_tracing();

    let registry = StreamRegistry::new(RegistryConfig::default());
    let me = ClientId::from("me_00000001");
    registry.initialize_client(me.clone(), "me", true);
    assert!(registry.timers_running());

    let mut version = registry.subscribe();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!version.has_changed().expect("Registry dropped"));

    registry.update_local_stream(true, Some(Bytes::from_static(b"jpeg")));
    version.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(version.has_changed().expect("Registry dropped"), "streaming entries refresh fps");
}
