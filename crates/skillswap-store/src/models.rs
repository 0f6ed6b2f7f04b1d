//! Domain model structs persisted in SQLite.
//!
//! Every struct derives `Serialize` so the HTTP layer can return it as JSON
//! directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

use skillswap_shared::{RecordingStatus, SessionId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account known to this server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One entry of a user's friend list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: UserId,
    pub display_name: Option<String>,
    pub friended_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Friend request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for FriendRequestStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(StoreError::Validation(format!(
                "unknown friend request status {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Call session
// ---------------------------------------------------------------------------

/// Recording metadata attached to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recording {
    pub status: RecordingStatus,
    pub url: Option<String>,
}

/// A persisted, accepted call between exactly two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub id: SessionId,
    /// Both participants in canonical order. Never equal.
    pub participants: [UserId; 2],
    pub started_at: DateTime<Utc>,
    /// `None` while the call is open.
    pub ended_at: Option<DateTime<Utc>>,
    pub recording: Recording,
    pub notes_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl CallSession {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    /// The participant that is not `user`, if `user` takes part at all.
    pub fn peer_of(&self, user: &UserId) -> Option<&UserId> {
        match &self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// Shared notes of a call session. The durable copy of what `notes:update`
/// syncs live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub session_id: SessionId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Call rating
// ---------------------------------------------------------------------------

/// Perceived call quality, as the rater picked it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CallQuality {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl CallQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

impl fmt::Display for CallQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallQuality {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Excellent" => Ok(Self::Excellent),
            "Good" => Ok(Self::Good),
            "Fair" => Ok(Self::Fair),
            "Poor" => Ok(Self::Poor),
            other => Err(StoreError::Validation(format!("unknown call quality {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CallIssue {
    #[serde(rename = "Audio Issues")]
    Audio,
    #[serde(rename = "Video Issues")]
    Video,
    #[serde(rename = "Connection Problems")]
    Connection,
    Lag,
    None,
}

/// A participant's verdict on a finished call. At most one per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallRating {
    pub id: Uuid,
    pub session_id: SessionId,
    pub rater_id: UserId,
    pub ratee_id: UserId,
    /// 1 to 10.
    pub rating: u8,
    pub feedback: Option<String>,
    pub call_duration_secs: u64,
    pub call_quality: CallQuality,
    pub issues: Vec<CallIssue>,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Database::submit_rating`](crate::Database::submit_rating).
#[derive(Debug, Clone, Default)]
pub struct NewRating {
    pub rating: u8,
    pub feedback: Option<String>,
    pub call_duration_secs: u64,
    pub call_quality: CallQuality,
    pub issues: Vec<CallIssue>,
}

/// Aggregate over every rating a user gave or received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Rounded to one decimal; `0.0` without ratings.
    pub average_rating: f64,
    pub total_calls: u64,
    pub total_rating: u64,
}
