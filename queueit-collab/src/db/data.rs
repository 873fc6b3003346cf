use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::{TrackData, TrackSource};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A participant, as resolved from a verified caller identity
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    /// The session this user is currently a member of, if any.
    /// A user belongs to at most one active session at a time.
    pub current_session: Option<PrimaryKey>,
}

/// A joinable, host-owned queue session
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The human-entered code used to join the session
    pub join_code: String,
    pub host: UserData,
    /// When locked, only the host may add entries to the queue
    pub locked: bool,
    /// The queue entry currently being played, if any.
    /// Mutated only through [advance_current] and [promote_if_idle].
    ///
    /// [advance_current]: super::Database::advance_current
    /// [promote_if_idle]: super::Database::promote_if_idle
    pub current_entry: Option<PrimaryKey>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_host(&self, user_id: PrimaryKey) -> bool {
        self.host.id == user_id
    }
}

/// One track's membership record within a session's queue
#[derive(Debug, Clone)]
pub struct QueueEntryData {
    pub id: PrimaryKey,
    pub session_id: PrimaryKey,
    pub status: EntryStatus,
    pub added_at: DateTime<Utc>,
    /// Live sum over the entry's votes, recomputed on every read
    pub votes: i64,
    pub track: TrackData,
    pub added_by: UserData,
}

/// Lifecycle status of a queue entry. Transitions are strictly forward:
/// `Queued → Playing → {Played, Skipped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Queued,
    Playing,
    Played,
    Skipped,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Playing => "playing",
            Self::Played => "played",
            Self::Skipped => "skipped",
        }
    }

    /// Returns true if an entry in this status is allowed to move to `next`
    pub fn can_become(&self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Playing)
                | (Self::Playing, Self::Played)
                | (Self::Playing, Self::Skipped)
        )
    }
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "playing" => Ok(Self::Playing),
            "played" => Ok(Self::Played),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown entry status: {}", other)),
        }
    }
}
