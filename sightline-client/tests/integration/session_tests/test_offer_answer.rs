use sightline_client::SessionState;
use sightline_client::session::TransportEvent;
use sightline_core::{ClientId, Envelope, MessageKind, SessionDescription, SignalMessage};

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{FakeTransportFactory, MockSignalingOutput, fake_candidate};

#[tokio::test]
async fn test_offer_is_addressed_to_remote_peer() {
    init_tracing();

    let (mut manager, factory, signaling) = create_test_session("alice");
    manager
        .start_offer(ClientId::from("bob"))
        .await
        .expect("Failed to start offer");

    assert_eq!(manager.state(), SessionState::Negotiating);
    assert_eq!(factory.created(), 1);
    assert_eq!(*factory.latest().offers.lock(), vec![false]);

    let offers = signaling.sent_of(MessageKind::Offer);
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].target_id, Some(ClientId::from("bob")));
    assert_eq!(manager.session().remote_peer_id, Some(ClientId::from("bob")));
}

#[tokio::test]
async fn test_answer_completes_offerer_negotiation() {
    init_tracing();

    let (mut manager, factory, _signaling) = create_test_session("alice");
    manager.start_offer(ClientId::from("bob")).await.unwrap();

    manager
        .handle_signal(Envelope::from_client(
            ClientId::from("bob"),
            SignalMessage::Answer {
                answer: SessionDescription::answer("v=0\r\n"),
            },
        ))
        .await
        .expect("Failed to accept answer");

    let transport = factory.latest();
    assert_eq!(transport.remote.lock().len(), 1);
    assert_eq!(manager.state(), SessionState::Negotiating);

    let generation = transport.generation();
    manager
        .handle_transport_event(
            generation,
            TransportEvent::ConnectionStateChanged(
                sightline_client::session::PeerConnectionState::Connected,
            ),
        )
        .await;
    assert_eq!(manager.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_answer_from_stranger_is_ignored() {
    init_tracing();

    let (mut manager, factory, _signaling) = create_test_session("alice");
    manager.start_offer(ClientId::from("bob")).await.unwrap();

    manager
        .handle_signal(Envelope::from_client(
            ClientId::from("mallory"),
            SignalMessage::Answer {
                answer: SessionDescription::answer("v=0\r\n"),
            },
        ))
        .await
        .unwrap();

    assert!(factory.latest().remote.lock().is_empty());
}

#[tokio::test]
async fn test_local_candidates_go_to_remote_and_stale_ones_are_dropped() {
    init_tracing();

    let factory = FakeTransportFactory::new();
    let signaling = MockSignalingOutput::new_stored_only("alice");
    let mut manager = sightline_client::PeerSessionManager::new(
        Default::default(),
        std::sync::Arc::new(factory.clone()),
        std::sync::Arc::new(signaling.clone()),
    );
    manager.start_offer(ClientId::from("bob")).await.unwrap();

    let generation = factory.latest().generation();
    manager
        .handle_transport_event(
            generation,
            TransportEvent::CandidateGenerated(fake_candidate(generation, 0)),
        )
        .await;
    manager
        .handle_transport_event(
            generation - 1,
            TransportEvent::CandidateGenerated(fake_candidate(generation - 1, 1)),
        )
        .await;

    let sent = signaling.sent_of(MessageKind::IceCandidate);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target_id, Some(ClientId::from("bob")));
    assert_eq!(
        sent[0].message,
        SignalMessage::IceCandidate {
            candidate: fake_candidate(generation, 0)
        }
    );
}
