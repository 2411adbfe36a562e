use bytes::Bytes;

use crate::integration::init_tracing;
use crate::utils::{SIGNAL_TIMEOUT_MS, connect_session, spawn_test_server, wait_until};

#[tokio::test]
async fn test_frames_and_status_reach_other_clients() {
    init_tracing();

    let server = spawn_test_server().await.expect("Failed to start server");
    let kitchen = connect_session(&server, "kitchen")
        .await
        .expect("kitchen failed to connect");
    let porch = connect_session(&server, "porch")
        .await
        .expect("porch failed to connect");

    let kitchen_id = kitchen.registry().local_id().unwrap();
    let porch_id = porch.registry().local_id().unwrap();
    assert_ne!(kitchen_id, porch_id);
    assert!(kitchen_id.as_str().starts_with("kitchen_"));

    assert!(kitchen.send_frame(Bytes::from_static(b"kitchen-frame")));
    assert!(porch.send_frame(Bytes::from_static(b"porch-frame")));

    let registry = porch.registry().clone();
    let watched = kitchen_id.clone();
    wait_until(SIGNAL_TIMEOUT_MS, move || {
        registry.client(&watched).is_some_and(|c| c.is_streaming)
    })
    .await
    .expect("porch never saw kitchen's stream");

    let registry = kitchen.registry().clone();
    wait_until(SIGNAL_TIMEOUT_MS, move || registry.streaming_clients_count() == 2)
        .await
        .expect("kitchen never saw both streams");

    let seen = porch.registry().client(&kitchen_id).unwrap();
    assert_eq!(seen.last_frame.as_deref(), Some(&b"kitchen-frame"[..]));
    assert_eq!(seen.display_name, format!("Client {}", kitchen_id.short()));

    // Leaving the server removes the stream everywhere else.
    kitchen.close();
    let registry = porch.registry().clone();
    wait_until(SIGNAL_TIMEOUT_MS, move || registry.client(&kitchen_id).is_none())
        .await
        .expect("kitchen was not removed after disconnect");

    porch.close();
}
