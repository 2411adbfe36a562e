use sightline_client::SessionState;
use sightline_core::{ClientId, Envelope, MessageKind, SessionDescription, SignalMessage};

use crate::integration::{create_test_session, init_tracing};
use crate::utils::fake_candidate;

fn from_alice(message: SignalMessage) -> Envelope {
    Envelope::from_client(ClientId::from("alice"), message)
}

#[tokio::test]
async fn test_candidates_wait_for_remote_description() {
    init_tracing();

    let (mut manager, factory, signaling) = create_test_session("bob");

    for n in 0..2 {
        manager
            .handle_signal(from_alice(SignalMessage::IceCandidate {
                candidate: fake_candidate(1, n),
            }))
            .await
            .unwrap();
    }
    assert_eq!(manager.pending_candidates(), 2);
    assert_eq!(factory.created(), 0);

    manager
        .handle_signal(from_alice(SignalMessage::Offer {
            offer: SessionDescription::offer("v=0\r\n"),
        }))
        .await
        .expect("Failed to accept offer");

    let transport = factory.latest();
    assert_eq!(manager.pending_candidates(), 0);
    assert_eq!(transport.candidates.lock().len(), 2);
    assert_eq!(manager.state(), SessionState::Negotiating);

    let answers = signaling.sent_of(MessageKind::Answer);
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].target_id, Some(ClientId::from("alice")));

    // After the remote description is in place candidates apply immediately.
    manager
        .handle_signal(from_alice(SignalMessage::IceCandidate {
            candidate: fake_candidate(1, 2),
        }))
        .await
        .unwrap();
    assert_eq!(manager.pending_candidates(), 0);
    assert_eq!(transport.candidates.lock().len(), 3);
}

#[tokio::test]
async fn test_offerer_buffers_candidates_until_answer() {
    init_tracing();

    let (mut manager, factory, _signaling) = create_test_session("alice");
    manager.start_offer(ClientId::from("bob")).await.unwrap();

    manager
        .handle_signal(Envelope::from_client(
            ClientId::from("bob"),
            SignalMessage::IceCandidate {
                candidate: fake_candidate(7, 0),
            },
        ))
        .await
        .unwrap();
    assert_eq!(manager.pending_candidates(), 1);
    assert!(factory.latest().candidates.lock().is_empty());

    manager
        .handle_signal(Envelope::from_client(
            ClientId::from("bob"),
            SignalMessage::Answer {
                answer: SessionDescription::answer("v=0\r\n"),
            },
        ))
        .await
        .unwrap();
    assert_eq!(manager.pending_candidates(), 0);
    assert_eq!(factory.latest().candidates.lock().len(), 1);
}
