use sightline_client::{MediaTrack, SessionError, SessionState};
use sightline_core::{ClientId, Envelope, SessionDescription, SignalMessage};

use crate::integration::{create_test_session, init_tracing};

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    init_tracing();

    let (mut manager, factory, _signaling) = create_test_session("alice");
    let video = MediaTrack::video("cam", "local");
    manager.add_local_track(video.clone()).await.unwrap();
    manager.start_offer(ClientId::from("bob")).await.unwrap();
    assert_eq!(*factory.latest().tracks.lock(), vec!["cam".to_owned()]);

    manager.cleanup().await;
    manager.cleanup().await;

    assert_eq!(manager.state(), SessionState::Closed);
    assert!(video.is_stopped());
    assert!(factory.latest().is_closed());
    assert!(!manager.recovery_pending());
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_closed_session_rejects_negotiation() {
    init_tracing();

    let (mut manager, factory, _signaling) = create_test_session("bob");
    manager.cleanup().await;

    let result = manager
        .handle_signal(Envelope::from_client(
            ClientId::from("alice"),
            SignalMessage::Offer {
                offer: SessionDescription::offer("v=0\r\n"),
            },
        ))
        .await;

    assert!(matches!(result, Err(SessionError::Closed)));
    assert_eq!(factory.created(), 0);
}
