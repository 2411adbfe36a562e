use sightline_core::ConnectionState;
use std::time::Duration;

use crate::integration::{create_test_channel, init_tracing};
use crate::utils::test_url;

#[tokio::test(start_paused = true)]
async fn test_reconnect_follows_exponential_backoff_then_fails() {
    init_tracing();

    let (channel, connector, mut servers) = create_test_channel();
    channel.connect(&test_url()).await.expect("Failed to connect");
    let server = servers.recv().await.expect("No server side");

    connector.refuse_all(true);
    drop(server);

    let mut state = channel.watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Failed)
        .await
        .expect("State channel closed");

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 6, "initial connect plus five reconnects");

    let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
            Duration::from_secs(16),
        ]
    );

    // Failed is terminal; nothing reschedules.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempts().len(), 6);
    assert_eq!(channel.state(), ConnectionState::Failed);
    assert!(!channel.send(sightline_core::Envelope::new(
        sightline_core::SignalMessage::Ping { timestamp: 0 }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_successful_reconnect_resets_attempts() {
    init_tracing();

    let (channel, connector, mut servers) = create_test_channel();
    channel.connect(&test_url()).await.expect("Failed to connect");
    let server = servers.recv().await.expect("No server side");

    connector.script(&[false, false, true]);
    drop(server);

    let _reopened = servers.recv().await.expect("Channel never reconnected");
    let mut state = channel.watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .expect("State channel closed");

    assert_eq!(channel.reconnect_attempts(), 0);
    assert_eq!(connector.attempts().len(), 4);
}

#[tokio::test]
async fn test_failed_first_connect_reports_error() {
    init_tracing();

    let (channel, connector, _servers) = create_test_channel();
    connector.refuse_all(true);

    let result = channel.connect(&test_url()).await;
    assert!(result.is_err());
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    assert_eq!(connector.attempts().len(), 1);
}
