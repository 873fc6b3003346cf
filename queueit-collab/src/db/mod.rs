use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

use crate::{NewTrack, TrackData};

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can store and fetch queueit data.
///
/// Multi-step mutations ([`advance_current`], [`promote_if_idle`]) commit
/// atomically: either every write in them is applied, or none is.
///
/// [`advance_current`]: Database::advance_current
/// [`promote_if_idle`]: Database::promote_if_idle
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    /// Resolves a verified caller identity from an opaque token.
    /// Token issuance is handled outside this system.
    async fn user_by_token(&self, token: &str) -> Result<UserData>;
    async fn set_current_session(
        &self,
        user_id: PrimaryKey,
        session_id: Option<PrimaryKey>,
    ) -> Result<()>;

    async fn session_by_id(&self, session_id: PrimaryKey) -> Result<SessionData>;
    async fn session_by_join_code(&self, join_code: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn set_locked(&self, session_id: PrimaryKey, locked: bool) -> Result<()>;
    /// All users whose current session is the given one
    async fn session_members(&self, session_id: PrimaryKey) -> Result<Vec<UserData>>;

    /// Inserts the track into the shared catalog cache, or refreshes its
    /// metadata if the external id is already known
    async fn upsert_track(&self, new_track: NewTrack) -> Result<TrackData>;

    async fn create_entry(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData>;
    async fn entry_by_id(&self, entry_id: PrimaryKey) -> Result<QueueEntryData>;
    /// All entries of a session still in [EntryStatus::Queued], with their
    /// live vote totals. No ordering is guaranteed here; ordering is the
    /// queue store's concern.
    async fn list_queue_entries(&self, session_id: PrimaryKey) -> Result<Vec<QueueEntryData>>;
    async fn update_entry_status(&self, entry_id: PrimaryKey, status: EntryStatus) -> Result<()>;

    /// Upserts a vote keyed by (entry, user) and returns the entry's
    /// recomputed total. Concurrent upserts from distinct users must not
    /// lose votes.
    async fn upsert_vote(
        &self,
        entry_id: PrimaryKey,
        user_id: PrimaryKey,
        value: i32,
    ) -> Result<i64>;

    /// Atomically marks the previous entry with its terminal status,
    /// promotes the next entry to playing, and repoints the session's
    /// current entry.
    ///
    /// The repoint is a compare-and-swap: it applies only while the
    /// session's current entry still matches `previous`. Returns false when
    /// another advancement won the race, in which case nothing is written.
    async fn advance_current(
        &self,
        session_id: PrimaryKey,
        previous: Option<(PrimaryKey, EntryStatus)>,
        next: Option<PrimaryKey>,
    ) -> Result<bool>;

    /// Sets the session's current entry to the given one only if no entry
    /// is currently playing, promoting it to [EntryStatus::Playing].
    /// Returns false if another entry already occupied the slot.
    async fn promote_if_idle(&self, session_id: PrimaryKey, entry_id: PrimaryKey) -> Result<bool>;
}

#[derive(Debug)]
pub struct NewSession {
    pub join_code: String,
    /// The host of the new session
    pub host_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewQueueEntry {
    pub session_id: PrimaryKey,
    pub added_by_id: PrimaryKey,
    /// External id of a track already upserted into the catalog cache
    pub track_external_id: String,
}
