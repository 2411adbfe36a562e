use sightline_client::session::{IceConnectionState, PeerConnectionState, TransportEvent};
use sightline_client::{PeerSessionManager, SessionConfig, SessionError, SessionState};
use sightline_core::{ClientId, Envelope, MessageKind, SessionDescription, SignalMessage};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{FakeTransportFactory, MockSignalingOutput, fake_candidate};

async fn connected_offerer() -> (PeerSessionManager, FakeTransportFactory, MockSignalingOutput) {
    let (mut manager, factory, signaling) = create_test_session("alice");
    manager.start_offer(ClientId::from("bob")).await.unwrap();
    manager
        .handle_signal(Envelope::from_client(
            ClientId::from("bob"),
            SignalMessage::Answer {
                answer: SessionDescription::answer("v=0\r\n"),
            },
        ))
        .await
        .unwrap();
    let generation = factory.latest().generation();
    manager
        .handle_transport_event(
            generation,
            TransportEvent::ConnectionStateChanged(PeerConnectionState::Connected),
        )
        .await;
    assert_eq!(manager.state(), SessionState::Connected);
    (manager, factory, signaling)
}

#[tokio::test]
async fn test_ice_failure_sends_restart_offer() {
    init_tracing();

    let (mut manager, factory, signaling) = connected_offerer().await;
    let generation = factory.latest().generation();

    manager
        .handle_transport_event(
            generation,
            TransportEvent::IceStateChanged(IceConnectionState::Failed),
        )
        .await;

    assert_eq!(factory.created(), 1, "ICE restart keeps the transport");
    assert_eq!(*factory.latest().offers.lock(), vec![false, true]);
    assert_eq!(signaling.sent_of(MessageKind::Offer).len(), 2);
    assert!(!manager.recovery_pending());

    // A second failure escalates to a full restart.
    manager
        .handle_transport_event(
            generation,
            TransportEvent::IceStateChanged(IceConnectionState::Failed),
        )
        .await;
    assert!(manager.recovery_pending());
    assert!(factory.latest().is_closed());
    assert_eq!(manager.state(), SessionState::Recovering);
}

#[tokio::test]
async fn test_connection_failure_rebuilds_and_renegotiates() {
    init_tracing();

    let (mut manager, factory, signaling) = connected_offerer().await;
    let generation = factory.latest().generation();

    manager
        .handle_transport_event(
            generation,
            TransportEvent::ConnectionStateChanged(PeerConnectionState::Failed),
        )
        .await;
    assert_eq!(manager.state(), SessionState::Recovering);
    assert!(factory.transport(0).is_closed());

    manager.recover().await.expect("Recovery failed");

    assert_eq!(factory.created(), 2);
    assert_eq!(manager.session().reconnect_count, 1);
    assert_eq!(*factory.transport(1).offers.lock(), vec![false]);
    assert_eq!(signaling.sent_of(MessageKind::Offer).len(), 2);
    assert_eq!(manager.state(), SessionState::Negotiating);

    // Events from the retired transport no longer matter.
    manager
        .handle_transport_event(
            generation,
            TransportEvent::ConnectionStateChanged(PeerConnectionState::Failed),
        )
        .await;
    assert!(!manager.recovery_pending());
}

#[tokio::test]
async fn test_recovery_gives_up_after_max_restarts() {
    init_tracing();

    let (mut manager, factory, _signaling) = connected_offerer().await;

    for _ in 0..5 {
        let generation = factory.latest().generation();
        manager
            .handle_transport_event(
                generation,
                TransportEvent::ConnectionStateChanged(PeerConnectionState::Failed),
            )
            .await;
        manager.recover().await.expect("Recovery should still be allowed");
    }
    assert_eq!(manager.session().reconnect_count, 5);

    let generation = factory.latest().generation();
    manager
        .handle_transport_event(
            generation,
            TransportEvent::ConnectionStateChanged(PeerConnectionState::Failed),
        )
        .await;
    let result = manager.recover().await;

    assert!(matches!(result, Err(SessionError::RecoveryExhausted(5))));
    assert_eq!(manager.state(), SessionState::Closed);
    assert_eq!(factory.created(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_answerer_falls_back_to_full_restart() {
    init_tracing();

    let factory = FakeTransportFactory::new();
    let signaling = MockSignalingOutput::new_stored_only("bob");
    let manager = PeerSessionManager::new(
        SessionConfig::default(),
        Arc::new(factory.clone()),
        Arc::new(signaling),
    );
    let mut handle = manager.spawn();

    handle
        .send(sightline_client::SessionInput::Signal(Envelope::from_client(
            ClientId::from("alice"),
            SignalMessage::Offer {
                offer: SessionDescription::offer("v=0\r\n"),
            },
        )))
        .await;
    assert!(
        handle
            .wait_for_state(SessionState::Negotiating, Duration::from_secs(1))
            .await
    );

    factory
        .latest()
        .emit(TransportEvent::IceStateChanged(IceConnectionState::Failed))
        .await;
    assert!(
        handle
            .wait_for_state(SessionState::Recovering, Duration::from_secs(1))
            .await
    );

    // No restart offer arrives from alice; the answerer rebuilds on its own.
    let started = tokio::time::Instant::now();
    assert!(
        handle
            .wait_for_state(SessionState::Idle, Duration::from_secs(30))
            .await
    );
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(factory.created(), 2);

    handle.shutdown().await.expect("Session loop failed");
}

#[tokio::test]
async fn test_renegotiation_rejected_by_transport_rebuilds_it() {
    init_tracing();

    let factory = FakeTransportFactory::rejecting_renegotiation();
    let signaling = MockSignalingOutput::new_stored_only("bob");
    let mut manager = PeerSessionManager::new(
        SessionConfig::default(),
        Arc::new(factory.clone()),
        Arc::new(signaling.clone()),
    );

    for _ in 0..2 {
        manager
            .handle_signal(Envelope::from_client(
                ClientId::from("alice"),
                SignalMessage::Offer {
                    offer: SessionDescription::offer("v=0\r\n"),
                },
            ))
            .await
            .expect("Offer should be answered");
    }

    assert_eq!(factory.created(), 2);
    assert!(factory.transport(0).is_closed());
    assert_eq!(signaling.sent_of(MessageKind::Answer).len(), 2);
}

#[tokio::test]
async fn test_candidates_from_failed_transport_are_discarded_on_restart() {
    init_tracing();

    let (mut manager, factory, _signaling) = connected_offerer().await;
    let generation = factory.latest().generation();
    manager
        .handle_transport_event(
            generation,
            TransportEvent::ConnectionStateChanged(PeerConnectionState::Failed),
        )
        .await;
    assert!(manager.recovery_pending());

    // Late candidates from the remote's old transport land during the delay.
    for n in 0..3 {
        manager
            .handle_signal(Envelope::from_client(
                ClientId::from("bob"),
                SignalMessage::IceCandidate {
                    candidate: fake_candidate(1, n),
                },
            ))
            .await
            .unwrap();
    }
    assert_eq!(manager.pending_candidates(), 3);

    manager.recover().await.expect("Recovery failed");
    assert_eq!(manager.pending_candidates(), 0);

    manager
        .handle_signal(Envelope::from_client(
            ClientId::from("bob"),
            SignalMessage::Answer {
                answer: SessionDescription::answer("v=0\r\n"),
            },
        ))
        .await
        .unwrap();
    assert!(factory.transport(1).candidates.lock().is_empty());
}
