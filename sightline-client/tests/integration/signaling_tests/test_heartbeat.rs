use sightline_core::SignalMessage;
use std::time::Duration;

use crate::integration::{create_test_channel, init_tracing};
use crate::utils::test_url;

#[tokio::test(start_paused = true)]
async fn test_ping_sent_every_heartbeat_interval() {
    init_tracing();

    let (channel, _connector, mut servers) = create_test_channel();
    channel.connect(&test_url()).await.expect("Failed to connect");
    let mut server = servers.recv().await.expect("No server side");

    let start = tokio::time::Instant::now();
    let first = server
        .next_envelope(60_000)
        .await
        .expect("No heartbeat arrived");
    assert!(matches!(first.message, SignalMessage::Ping { .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(30));

    let second = server
        .next_envelope(60_000)
        .await
        .expect("No second heartbeat");
    assert!(matches!(second.message, SignalMessage::Ping { .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}
