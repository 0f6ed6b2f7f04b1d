//! WebSocket wire protocol.
//!
//! Every frame is a JSON text message `{"event": "<name>", "data": ...}`.
//! Client and server vocabularies are closed enums so that dispatch is an
//! exhaustive `match`. Payload bodies the relay does not inspect (SDP, ICE,
//! strokes) travel as opaque `serde_json::Value`s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CallId, SessionId, UserId};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Events a connected client may emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "call:initiate")]
    CallInitiate(CallTarget),
    #[serde(rename = "call:accept")]
    CallAccept(CallRef),
    #[serde(rename = "call:reject")]
    CallReject(CallRef),
    #[serde(rename = "call:join")]
    CallJoin(JoinSession),
    #[serde(rename = "call:end")]
    CallEnd(SessionRef),

    #[serde(rename = "call:offer")]
    CallOffer(SignalEnvelope),
    #[serde(rename = "call:answer")]
    CallAnswer(SignalEnvelope),
    #[serde(rename = "call:ice-candidate")]
    CallIceCandidate(SignalEnvelope),
    #[serde(rename = "call:screen:start")]
    CallScreenStart(SignalEnvelope),
    #[serde(rename = "call:screen:stop")]
    CallScreenStop(SignalEnvelope),
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer(SignalEnvelope),
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer(SignalEnvelope),
    #[serde(rename = "webrtc:ice-candidate")]
    WebrtcIceCandidate(SignalEnvelope),

    #[serde(rename = "whiteboard:stroke")]
    WhiteboardStroke(StrokeEnvelope),
    #[serde(rename = "whiteboard:clear")]
    WhiteboardClear(PeerScope),
    #[serde(rename = "notes:update")]
    NotesUpdate(NotesEnvelope),

    #[serde(rename = "user:typing")]
    Typing(TypingTarget),
    #[serde(rename = "user:typing:stop")]
    TypingStop(TypingTarget),
    #[serde(rename = "check:online")]
    CheckOnline(OnlineQuery),
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallInitiate(_) => "call:initiate",
            Self::CallAccept(_) => "call:accept",
            Self::CallReject(_) => "call:reject",
            Self::CallJoin(_) => "call:join",
            Self::CallEnd(_) => "call:end",
            Self::CallOffer(_) => SignalKind::CallOffer.event_name(),
            Self::CallAnswer(_) => SignalKind::CallAnswer.event_name(),
            Self::CallIceCandidate(_) => SignalKind::CallIceCandidate.event_name(),
            Self::CallScreenStart(_) => SignalKind::CallScreenStart.event_name(),
            Self::CallScreenStop(_) => SignalKind::CallScreenStop.event_name(),
            Self::WebrtcOffer(_) => SignalKind::WebrtcOffer.event_name(),
            Self::WebrtcAnswer(_) => SignalKind::WebrtcAnswer.event_name(),
            Self::WebrtcIceCandidate(_) => SignalKind::WebrtcIceCandidate.event_name(),
            Self::WhiteboardStroke(_) => "whiteboard:stroke",
            Self::WhiteboardClear(_) => "whiteboard:clear",
            Self::NotesUpdate(_) => "notes:update",
            Self::Typing(_) => "user:typing",
            Self::TypingStop(_) => "user:typing:stop",
            Self::CheckOnline(_) => "check:online",
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallTarget {
    pub to: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRef {
    pub call_id: CallId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSession {
    pub session_id: SessionId,
    pub peer_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub session_id: SessionId,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeEnvelope {
    pub session_id: SessionId,
    pub peer_id: UserId,
    #[serde(default)]
    pub stroke: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerScope {
    pub session_id: SessionId,
    pub peer_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesEnvelope {
    pub session_id: SessionId,
    pub peer_id: UserId,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingTarget {
    pub to: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineQuery {
    pub target_user_id: UserId,
}

// ---------------------------------------------------------------------------
// Signaling kinds
// ---------------------------------------------------------------------------

/// The relayable negotiation messages. The relay never looks inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    CallOffer,
    CallAnswer,
    CallIceCandidate,
    CallScreenStart,
    CallScreenStop,
    WebrtcOffer,
    WebrtcAnswer,
    WebrtcIceCandidate,
}

impl SignalKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CallOffer => "call:offer",
            Self::CallAnswer => "call:answer",
            Self::CallIceCandidate => "call:ice-candidate",
            Self::CallScreenStart => "call:screen:start",
            Self::CallScreenStop => "call:screen:stop",
            Self::WebrtcOffer => "webrtc:offer",
            Self::WebrtcAnswer => "webrtc:answer",
            Self::WebrtcIceCandidate => "webrtc:ice-candidate",
        }
    }

    /// Wrap a relayed payload in the server event of the same name.
    pub fn into_event(self, from: UserId, payload: Value) -> ServerEvent {
        let relayed = Relayed { from, payload };
        match self {
            Self::CallOffer => ServerEvent::CallOffer(relayed),
            Self::CallAnswer => ServerEvent::CallAnswer(relayed),
            Self::CallIceCandidate => ServerEvent::CallIceCandidate(relayed),
            Self::CallScreenStart => ServerEvent::CallScreenStart(relayed),
            Self::CallScreenStop => ServerEvent::CallScreenStop(relayed),
            Self::WebrtcOffer => ServerEvent::WebrtcOffer(relayed),
            Self::WebrtcAnswer => ServerEvent::WebrtcAnswer(relayed),
            Self::WebrtcIceCandidate => ServerEvent::WebrtcIceCandidate(relayed),
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Events the relay delivers to connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "users:online")]
    UsersOnline(Vec<UserId>),
    #[serde(rename = "user:online")]
    UserOnline(UserId),
    #[serde(rename = "user:offline")]
    UserOffline(UserId),
    #[serde(rename = "user:status")]
    UserStatus(UserStatus),

    #[serde(rename = "call:incoming")]
    CallIncoming(IncomingCall),
    #[serde(rename = "call:initiated")]
    CallInitiated(CallRef),
    #[serde(rename = "call:accepted")]
    CallAccepted(AcceptedCall),
    #[serde(rename = "call:rejected")]
    CallRejected(ClosedCall),
    #[serde(rename = "call:timeout")]
    CallTimeout(ClosedCall),
    #[serde(rename = "call:error")]
    CallError(CallError),
    #[serde(rename = "call:user-joined")]
    CallUserJoined(UserJoined),
    #[serde(rename = "call:end")]
    CallEnd,

    #[serde(rename = "call:offer")]
    CallOffer(Relayed),
    #[serde(rename = "call:answer")]
    CallAnswer(Relayed),
    #[serde(rename = "call:ice-candidate")]
    CallIceCandidate(Relayed),
    #[serde(rename = "call:screen:start")]
    CallScreenStart(Relayed),
    #[serde(rename = "call:screen:stop")]
    CallScreenStop(Relayed),
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer(Relayed),
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer(Relayed),
    #[serde(rename = "webrtc:ice-candidate")]
    WebrtcIceCandidate(Relayed),

    #[serde(rename = "whiteboard:stroke")]
    WhiteboardStroke(RelayedStroke),
    #[serde(rename = "whiteboard:clear")]
    WhiteboardClear(FromUser),
    #[serde(rename = "notes:update")]
    NotesUpdate(RelayedNotes),

    #[serde(rename = "user:typing")]
    Typing(FromUser),
    #[serde(rename = "user:typing:stop")]
    TypingStop(FromUser),
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl CallRef {
    pub fn new(call_id: CallId) -> Self {
        Self { call_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: UserId,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub from: UserId,
    pub call_id: CallId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedCall {
    pub call_id: CallId,
    pub session_id: SessionId,
    pub peer_id: UserId,
}

/// Payload of `call:rejected` (with `by`) and `call:timeout` (without).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedCall {
    pub call_id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallError {
    pub code: CallErrorCode,
    pub message: String,
}

impl From<CallErrorCode> for CallError {
    fn from(code: CallErrorCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
        }
    }
}

/// Reasons surfaced to users when initiate/accept made no progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallErrorCode {
    NotFriends,
    UserOffline,
    InitiateFailed,
    AcceptFailed,
}

impl CallErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFriends => "Not friends",
            Self::UserOffline => "User offline",
            Self::InitiateFailed => "Failed to initiate call",
            Self::AcceptFailed => "Failed to accept call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoined {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relayed {
    pub from: UserId,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedStroke {
    pub from: UserId,
    pub stroke: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedNotes {
    pub from: UserId,
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromUser {
    pub from: UserId,
}
