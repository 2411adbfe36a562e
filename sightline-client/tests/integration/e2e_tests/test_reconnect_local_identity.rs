use bytes::Bytes;
use sightline_client::{RegistryConfig, StreamingSession};
use sightline_core::{ClientId, ConnectionState, Envelope, SignalMessage};

use crate::integration::{create_test_channel, init_tracing};
use crate::utils::{test_url, wait_until};

#[tokio::test(start_paused = true)]
async fn test_reconnect_replaces_local_entry() {
    init_tracing();

    let (channel, _connector, mut servers) = create_test_channel();
    let session = StreamingSession::new(channel, RegistryConfig::default());
    session.connect(&test_url()).await.expect("Failed to connect");
    let server = servers.recv().await.expect("No server side");

    let first = ClientId::from("me_00000001");
    server.push(Envelope::new(SignalMessage::ClientInfo {
        client_id: first.clone(),
        display_name: "me".to_owned(),
    }));
    let registry = session.registry().clone();
    let expected = first.clone();
    wait_until(1000, move || registry.local_id().as_ref() == Some(&expected))
        .await
        .expect("First client_info never applied");

    session.send_frame(Bytes::from_static(b"jpeg"));
    assert!(session.registry().client(&first).unwrap().is_streaming);

    drop(server);
    let server = servers.recv().await.expect("Channel never reconnected");
    let mut state = session.channel().watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .expect("State channel closed");

    let second = ClientId::from("me_00000002");
    server.push(Envelope::new(SignalMessage::ClientInfo {
        client_id: second.clone(),
        display_name: "me".to_owned(),
    }));
    let registry = session.registry().clone();
    let expected = second.clone();
    wait_until(1000, move || registry.local_id().as_ref() == Some(&expected))
        .await
        .expect("Second client_info never applied");

    let clients = session.registry().clients_list();
    assert_eq!(clients.len(), 1, "only one local entry survives a reconnect");
    assert_eq!(clients[0].id, second);
    assert_eq!(clients[0].display_name, "me (You)");
    assert!(!clients[0].is_streaming);
    assert!(session.registry().client(&first).is_none());
    assert_eq!(session.registry().streaming_clients_count(), 0);

    session.send_frame(Bytes::from_static(b"jpeg"));
    assert_eq!(session.registry().streaming_clients_count(), 1);

    session.close();
}
