use tracing::debug;

use skillswap_shared::protocol::{
    FromUser, NotesEnvelope, PeerScope, RelayedNotes, RelayedStroke, ServerEvent, StrokeEnvelope,
};
use skillswap_shared::{SessionId, UserId};

use crate::hub::{ConnectionContext, Hub};

impl Hub {
    pub(crate) async fn relay_stroke(
        &self,
        ctx: &ConnectionContext,
        envelope: StrokeEnvelope,
    ) {
        if envelope.stroke.is_null() {
            debug!(user = %ctx.user, "Dropping empty stroke");
            return;
        }
        if !self
            .may_collaborate(ctx, envelope.session_id, &envelope.peer_id)
            .await
        {
            return;
        }
        self.broadcast_to_room(
            &envelope.session_id,
            ServerEvent::WhiteboardStroke(RelayedStroke {
                from: ctx.user.clone(),
                stroke: envelope.stroke,
            }),
        );
    }

    pub(crate) async fn relay_clear(&self, ctx: &ConnectionContext, scope: PeerScope) {
        if !self.may_collaborate(ctx, scope.session_id, &scope.peer_id).await {
            return;
        }
        self.broadcast_to_room(
            &scope.session_id,
            ServerEvent::WhiteboardClear(FromUser {
                from: ctx.user.clone(),
            }),
        );
    }

    /// Live notes are relayed only; persistence goes through the REST API.
    pub(crate) async fn relay_notes(&self, ctx: &ConnectionContext, envelope: NotesEnvelope) {
        if !self
            .may_collaborate(ctx, envelope.session_id, &envelope.peer_id)
            .await
        {
            return;
        }
        self.broadcast_to_room(
            &envelope.session_id,
            ServerEvent::NotesUpdate(RelayedNotes {
                from: ctx.user.clone(),
                content: envelope.content,
            }),
        );
    }

    /// Sender is a participant of the session and still friends with the
    /// named peer.
    async fn may_collaborate(
        &self,
        ctx: &ConnectionContext,
        session_id: SessionId,
        peer: &UserId,
    ) -> bool {
        if !self.is_participant(session_id, &ctx.user).await {
            debug!(user = %ctx.user, session = %session_id, "Dropping collaboration event from non-participant");
            return false;
        }
        if !self.are_friends(&ctx.user, peer).await {
            debug!(user = %ctx.user, peer = %peer, "Dropping collaboration event: not friends");
            return false;
        }
        true
    }
}
