use tracing::debug;

use skillswap_shared::protocol::{SignalEnvelope, SignalKind};

use crate::hub::{ConnectionContext, Hub};

impl Hub {
    /// Forward a WebRTC negotiation message to the session room.
    ///
    /// The payload is opaque; only the sender's membership in the session is
    /// checked.
    pub(crate) async fn relay_signal(
        &self,
        ctx: &ConnectionContext,
        kind: SignalKind,
        envelope: SignalEnvelope,
    ) {
        if !self.is_participant(envelope.session_id, &ctx.user).await {
            debug!(
                user = %ctx.user,
                session = %envelope.session_id,
                event = kind.event_name(),
                "Dropping signal from non-participant"
            );
            return;
        }

        let delivered = self.broadcast_to_room(
            &envelope.session_id,
            kind.into_event(ctx.user.clone(), envelope.payload),
        );
        debug!(
            session = %envelope.session_id,
            event = kind.event_name(),
            delivered,
            "Relayed signal"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use skillswap_shared::protocol::{ClientEvent, Relayed, ServerEvent, SignalEnvelope};

    use crate::testing::*;

    #[tokio::test]
    async fn test_offer_reaches_room_members() {
        let (hub, dir) = fixture();
        dir.befriend("alice", "bob");
        let session = dir.open_session("alice", "bob");
        let (alice, mut alice_rx) = connect_as(&hub, "alice");
        let (bob, mut bob_rx) = connect_as(&hub, "bob");
        hub.handle(&alice, join_event(session, "bob")).await;
        hub.handle(&bob, join_event(session, "alice")).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let sdp = json!({ "type": "offer", "sdp": "v=0" });
        hub.handle(
            &alice,
            ClientEvent::WebrtcOffer(SignalEnvelope {
                session_id: session,
                payload: sdp.clone(),
            }),
        )
        .await;

        let expected = ServerEvent::WebrtcOffer(Relayed {
            from: uid("alice"),
            payload: sdp,
        });
        assert_eq!(drain(&mut bob_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut alice_rx), vec![expected]);
    }

    #[tokio::test]
    async fn test_outsider_signal_is_dropped() {
        let (hub, dir) = fixture();
        dir.befriend("alice", "bob");
        let session = dir.open_session("alice", "bob");
        let (alice, mut alice_rx) = connect_as(&hub, "alice");
        let (mallory, _mallory_rx) = connect_as(&hub, "mallory");
        hub.handle(&alice, join_event(session, "bob")).await;
        drain(&mut alice_rx);

        hub.handle(
            &mallory,
            ClientEvent::CallIceCandidate(SignalEnvelope {
                session_id: session,
                payload: json!({ "candidate": "candidate:1" }),
            }),
        )
        .await;
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn test_participant_outside_room_hears_nothing() {
        let (hub, dir) = fixture();
        dir.befriend("alice", "bob");
        let session = dir.open_session("alice", "bob");
        let (alice, mut alice_rx) = connect_as(&hub, "alice");
        let (_bob, mut bob_rx) = connect_as(&hub, "bob");
        hub.handle(&alice, join_event(session, "bob")).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.handle(
            &alice,
            ClientEvent::CallScreenStart(SignalEnvelope {
                session_id: session,
                payload: json!(null),
            }),
        )
        .await;
        assert!(drain(&mut bob_rx).is_empty());
        assert_eq!(drain(&mut alice_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_rooms() {
        let (hub, dir) = fixture();
        dir.befriend("alice", "bob");
        let session = dir.open_session("alice", "bob");
        let (alice, mut alice_rx) = connect_as(&hub, "alice");
        let (bob, mut bob_rx) = connect_as(&hub, "bob");
        hub.handle(&alice, join_event(session, "bob")).await;
        hub.handle(&bob, join_event(session, "alice")).await;
        hub.disconnect(&alice);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.handle(
            &bob,
            ClientEvent::CallAnswer(SignalEnvelope {
                session_id: session,
                payload: json!({ "type": "answer" }),
            }),
        )
        .await;
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(drain(&mut bob_rx).len(), 1);
    }
}
