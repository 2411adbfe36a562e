use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sightline_client::{RegistryConfig, StreamingSession};
use sightline_core::{
    ClientId, Envelope, MessageKind, MetricsPayload, SessionDescription, SignalMessage,
};

use crate::integration::{create_test_channel, init_tracing};
use crate::utils::{test_url, wait_until};

#[tokio::test]
async fn test_inbound_events_feed_registry_and_negotiation() {
    init_tracing();

    let (channel, _connector, mut servers) = create_test_channel();
    let session = StreamingSession::new(channel, RegistryConfig::default());
    let mut inbox = session.take_negotiation_inbox().expect("Inbox already taken");
    assert!(session.take_negotiation_inbox().is_none());

    session.connect(&test_url()).await.expect("Failed to connect");
    let server = servers.recv().await.expect("No server side");

    let me = ClientId::from("me_00000001");
    let other = ClientId::from("other_00000002");
    server.push(Envelope::new(SignalMessage::ClientInfo {
        client_id: me.clone(),
        display_name: "me".to_owned(),
    }));
    server.push(Envelope::from_client(
        other.clone(),
        SignalMessage::Frame {
            content: STANDARD.encode(b"jpeg-bytes"),
            timestamp: Some(1),
        },
    ));
    server.push(Envelope::from_client(
        other.clone(),
        SignalMessage::MetricsUpdate {
            metrics: MetricsPayload {
                frame_count: 42,
                fps: 14.0,
                duration_ms: 3000,
                is_streaming: true,
            },
        },
    ));
    server.push(
        Envelope::from_client(
            other.clone(),
            SignalMessage::Offer {
                offer: SessionDescription::offer("v=0\r\n"),
            },
        )
        .with_target(me.clone()),
    );

    let negotiation = inbox.recv().await.expect("Offer was not forwarded");
    assert_eq!(negotiation.kind(), MessageKind::Offer);
    assert_eq!(negotiation.client_id, Some(other.clone()));

    let registry = session.registry().clone();
    let watched = other.clone();
    wait_until(1000, move || {
        registry
            .client(&watched)
            .is_some_and(|c| c.metrics.frame_count == 42)
    })
    .await
    .expect("Remote metrics never applied");

    let local = session.registry().client(&me).expect("Local entry missing");
    assert_eq!(local.display_name, "me (You)");
    let remote = session.registry().client(&other).unwrap();
    assert!(remote.is_streaming);
    assert_eq!(remote.last_frame.as_deref(), Some(&b"jpeg-bytes"[..]));

    server.push(Envelope::from_client(other.clone(), SignalMessage::ClientDisconnect));
    let registry = session.registry().clone();
    wait_until(1000, move || registry.client(&other).is_none())
        .await
        .expect("Disconnected client was not removed");

    session.close();
    session.close();
    assert!(session.registry().clients_list().is_empty());
}
