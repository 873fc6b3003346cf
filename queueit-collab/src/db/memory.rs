use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::{
    Database, DatabaseError, EntryStatus, NewQueueEntry, NewSession, NewTrack, PrimaryKey,
    QueueEntryData, Result, SessionData, TrackData, UserData,
};

/// An in-memory database used by the test suite and for running queueit
/// without a postgres instance. Data does not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicI32,

    users: DashMap<PrimaryKey, UserRow>,
    tokens: DashMap<String, PrimaryKey>,
    sessions: DashMap<PrimaryKey, SessionRow>,
    tracks: DashMap<String, TrackData>,
    entries: DashMap<PrimaryKey, EntryRow>,
    votes: DashMap<(PrimaryKey, PrimaryKey), i32>,

    /// Serializes advancement mutations, standing in for the transactional
    /// guarantee of the real store
    advance_lock: Mutex<()>,
    /// Makes the join code uniqueness check and insert one step, standing
    /// in for the unique index of the real store
    create_lock: Mutex<()>,
}

#[derive(Debug, Clone)]
struct UserRow {
    id: PrimaryKey,
    username: String,
    current_session: Option<PrimaryKey>,
}

#[derive(Debug, Clone)]
struct SessionRow {
    id: PrimaryKey,
    join_code: String,
    host_id: PrimaryKey,
    locked: bool,
    current_entry: Option<PrimaryKey>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct EntryRow {
    id: PrimaryKey,
    session_id: PrimaryKey,
    track_external_id: String,
    added_by_id: PrimaryKey,
    status: EntryStatus,
    created_at: DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a user. Account creation is handled outside the engine,
    /// so this is not part of the [Database] trait.
    pub fn add_user(&self, username: &str) -> UserData {
        let id = self.next_id();

        self.inner.users.insert(
            id,
            UserRow {
                id,
                username: username.to_string(),
                current_session: None,
            },
        );

        UserData {
            id,
            username: username.to_string(),
            current_session: None,
        }
    }

    /// Registers a verified identity token for a user
    pub fn add_token(&self, token: &str, user_id: PrimaryKey) {
        self.inner.tokens.insert(token.to_string(), user_id);
    }

    fn next_id(&self) -> PrimaryKey {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn user_row(&self, user_id: PrimaryKey) -> Result<UserRow> {
        self.inner
            .users
            .get(&user_id)
            .map(|u| u.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn user_data(&self, user_id: PrimaryKey) -> Result<UserData> {
        let row = self.user_row(user_id)?;

        Ok(UserData {
            id: row.id,
            username: row.username,
            current_session: row.current_session,
        })
    }

    fn session_data(&self, row: &SessionRow) -> Result<SessionData> {
        Ok(SessionData {
            id: row.id,
            join_code: row.join_code.clone(),
            host: self.user_data(row.host_id)?,
            locked: row.locked,
            current_entry: row.current_entry,
            created_at: row.created_at,
        })
    }

    fn entry_data(&self, row: &EntryRow) -> Result<QueueEntryData> {
        let track = self
            .inner
            .tracks
            .get(&row.track_external_id)
            .map(|t| t.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "track",
                identifier: "external_id",
            })?;

        Ok(QueueEntryData {
            id: row.id,
            session_id: row.session_id,
            status: row.status,
            added_at: row.created_at,
            votes: self.vote_total(row.id),
            track,
            added_by: self.user_data(row.added_by_id)?,
        })
    }

    fn vote_total(&self, entry_id: PrimaryKey) -> i64 {
        self.inner
            .votes
            .iter()
            .filter(|vote| vote.key().0 == entry_id)
            .map(|vote| *vote.value() as i64)
            .sum()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.user_data(user_id)
    }

    async fn user_by_token(&self, token: &str) -> Result<UserData> {
        let user_id = self
            .inner
            .tokens
            .get(token)
            .map(|t| *t)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "token",
            })?;

        self.user_data(user_id)
    }

    async fn set_current_session(
        &self,
        user_id: PrimaryKey,
        session_id: Option<PrimaryKey>,
    ) -> Result<()> {
        let mut user = self
            .inner
            .users
            .get_mut(&user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        user.current_session = session_id;
        Ok(())
    }

    async fn session_by_id(&self, session_id: PrimaryKey) -> Result<SessionData> {
        let row = self
            .inner
            .sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "id",
            })?;

        self.session_data(&row)
    }

    async fn session_by_join_code(&self, join_code: &str) -> Result<SessionData> {
        let row = self
            .inner
            .sessions
            .iter()
            .find(|s| s.join_code == join_code)
            .map(|s| s.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "join_code",
            })?;

        self.session_data(&row)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let _guard = self.inner.create_lock.lock();

        let exists = self
            .inner
            .sessions
            .iter()
            .any(|s| s.join_code == new_session.join_code);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "session",
                field: "join_code",
                value: new_session.join_code,
            });
        }

        let id = self.next_id();
        let row = SessionRow {
            id,
            join_code: new_session.join_code,
            host_id: new_session.host_id,
            locked: false,
            current_entry: None,
            created_at: Utc::now(),
        };

        let data = self.session_data(&row)?;
        self.inner.sessions.insert(id, row);

        Ok(data)
    }

    async fn set_locked(&self, session_id: PrimaryKey, locked: bool) -> Result<()> {
        let mut session =
            self.inner
                .sessions
                .get_mut(&session_id)
                .ok_or(DatabaseError::NotFound {
                    resource: "session",
                    identifier: "id",
                })?;

        session.locked = locked;
        Ok(())
    }

    async fn session_members(&self, session_id: PrimaryKey) -> Result<Vec<UserData>> {
        let members = self
            .inner
            .users
            .iter()
            .filter(|u| u.current_session == Some(session_id))
            .map(|u| UserData {
                id: u.id,
                username: u.username.clone(),
                current_session: u.current_session,
            })
            .collect();

        Ok(members)
    }

    async fn upsert_track(&self, new_track: NewTrack) -> Result<TrackData> {
        let track = TrackData {
            external_id: new_track.external_id.clone(),
            source: new_track.source,
            title: new_track.title,
            artist: new_track.artist,
            album: new_track.album,
            duration_ms: new_track.duration_ms,
            artwork: new_track.artwork,
            isrc: new_track.isrc,
        };

        self.inner
            .tracks
            .insert(new_track.external_id, track.clone());

        Ok(track)
    }

    async fn create_entry(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData> {
        let id = self.next_id();
        let row = EntryRow {
            id,
            session_id: new_entry.session_id,
            track_external_id: new_entry.track_external_id,
            added_by_id: new_entry.added_by_id,
            status: EntryStatus::Queued,
            created_at: Utc::now(),
        };

        let data = self.entry_data(&row)?;
        self.inner.entries.insert(id, row);

        Ok(data)
    }

    async fn entry_by_id(&self, entry_id: PrimaryKey) -> Result<QueueEntryData> {
        let row = self
            .inner
            .entries
            .get(&entry_id)
            .map(|e| e.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "queue entry",
                identifier: "id",
            })?;

        self.entry_data(&row)
    }

    async fn list_queue_entries(&self, session_id: PrimaryKey) -> Result<Vec<QueueEntryData>> {
        let rows: Vec<_> = self
            .inner
            .entries
            .iter()
            .filter(|e| e.session_id == session_id && e.status == EntryStatus::Queued)
            .map(|e| e.clone())
            .collect();

        rows.iter().map(|row| self.entry_data(row)).collect()
    }

    async fn update_entry_status(&self, entry_id: PrimaryKey, status: EntryStatus) -> Result<()> {
        let mut entry = self
            .inner
            .entries
            .get_mut(&entry_id)
            .ok_or(DatabaseError::NotFound {
                resource: "queue entry",
                identifier: "id",
            })?;

        entry.status = status;
        Ok(())
    }

    async fn upsert_vote(
        &self,
        entry_id: PrimaryKey,
        user_id: PrimaryKey,
        value: i32,
    ) -> Result<i64> {
        if !self.inner.entries.contains_key(&entry_id) {
            return Err(DatabaseError::NotFound {
                resource: "queue entry",
                identifier: "id",
            });
        }

        self.inner.votes.insert((entry_id, user_id), value);
        Ok(self.vote_total(entry_id))
    }

    async fn advance_current(
        &self,
        session_id: PrimaryKey,
        previous: Option<(PrimaryKey, EntryStatus)>,
        next: Option<PrimaryKey>,
    ) -> Result<bool> {
        let _guard = self.inner.advance_lock.lock();

        let mut session =
            self.inner
                .sessions
                .get_mut(&session_id)
                .ok_or(DatabaseError::NotFound {
                    resource: "session",
                    identifier: "id",
                })?;

        // Another advancement moved the slot since the caller's snapshot
        if session.current_entry != previous.map(|(entry_id, _)| entry_id) {
            return Ok(false);
        }

        if let Some((entry_id, status)) = previous {
            if let Some(mut entry) = self.inner.entries.get_mut(&entry_id) {
                entry.status = status;
            }
        }

        if let Some(entry_id) = next {
            if let Some(mut entry) = self.inner.entries.get_mut(&entry_id) {
                entry.status = EntryStatus::Playing;
            }
        }

        session.current_entry = next;
        Ok(true)
    }

    async fn promote_if_idle(&self, session_id: PrimaryKey, entry_id: PrimaryKey) -> Result<bool> {
        let _guard = self.inner.advance_lock.lock();

        let mut session =
            self.inner
                .sessions
                .get_mut(&session_id)
                .ok_or(DatabaseError::NotFound {
                    resource: "session",
                    identifier: "id",
                })?;

        if session.current_entry.is_some() {
            return Ok(false);
        }

        session.current_entry = Some(entry_id);

        if let Some(mut entry) = self.inner.entries.get_mut(&entry_id) {
            entry.status = EntryStatus::Playing;
        }

        Ok(true)
    }
}
