use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    query, query_scalar, Error as SqlxError, PgPool, Row,
};

use crate::{
    Database, DatabaseError, DatabaseResult, EntryStatus, IntoDatabaseError, NewQueueEntry,
    NewSession, NewTrack, PrimaryKey, QueueEntryData, Result, SessionData, TrackData, TrackSource,
    UserData,
};

/// Base select for queue entries, joined with their track, the adding user,
/// and the live vote total summed from the ledger
const ENTRY_SELECT: &str = "
    SELECT
        entries.id, entries.session_id, entries.status, entries.created_at,
        tracks.external_id, tracks.source, tracks.title, tracks.artist,
        tracks.album, tracks.duration_ms, tracks.artwork, tracks.isrc,
        users.id AS added_by_id, users.username, users.current_session_id,
        COALESCE(totals.votes, 0)::BIGINT AS votes
    FROM queue_entries AS entries
        INNER JOIN tracks ON tracks.external_id = entries.track_external_id
        INNER JOIN users ON users.id = entries.added_by_id
        LEFT JOIN (
            SELECT entry_id, SUM(value) AS votes FROM votes GROUP BY entry_id
        ) AS totals ON totals.entry_id = entries.id";

/// A postgres database implementation for queueit
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    fn user_from_row(row: &PgRow) -> Result<UserData> {
        Ok(UserData {
            id: row.try_get("id").map_err(|e| e.any())?,
            username: row.try_get("username").map_err(|e| e.any())?,
            current_session: row.try_get("current_session_id").map_err(|e| e.any())?,
        })
    }

    fn session_from_row(row: &PgRow) -> Result<SessionData> {
        Ok(SessionData {
            id: row.try_get("id").map_err(|e| e.any())?,
            join_code: row.try_get("join_code").map_err(|e| e.any())?,
            locked: row.try_get("locked").map_err(|e| e.any())?,
            current_entry: row.try_get("current_entry_id").map_err(|e| e.any())?,
            created_at: row.try_get("created_at").map_err(|e| e.any())?,
            host: UserData {
                id: row.try_get("host_id").map_err(|e| e.any())?,
                username: row.try_get("host_username").map_err(|e| e.any())?,
                current_session: row.try_get("host_session_id").map_err(|e| e.any())?,
            },
        })
    }

    fn entry_from_row(row: &PgRow) -> Result<QueueEntryData> {
        let status: String = row.try_get("status").map_err(|e| e.any())?;
        let source: String = row.try_get("source").map_err(|e| e.any())?;

        Ok(QueueEntryData {
            id: row.try_get("id").map_err(|e| e.any())?,
            session_id: row.try_get("session_id").map_err(|e| e.any())?,
            status: EntryStatus::from_str(&status).map_err(DatabaseError::internal)?,
            added_at: row.try_get("created_at").map_err(|e| e.any())?,
            votes: row.try_get("votes").map_err(|e| e.any())?,
            track: TrackData {
                external_id: row.try_get("external_id").map_err(|e| e.any())?,
                source: TrackSource::from_str(&source).map_err(DatabaseError::internal)?,
                title: row.try_get("title").map_err(|e| e.any())?,
                artist: row.try_get("artist").map_err(|e| e.any())?,
                album: row.try_get("album").map_err(|e| e.any())?,
                duration_ms: row.try_get("duration_ms").map_err(|e| e.any())?,
                artwork: row.try_get("artwork").map_err(|e| e.any())?,
                isrc: row.try_get("isrc").map_err(|e| e.any())?,
            },
            added_by: UserData {
                id: row.try_get("added_by_id").map_err(|e| e.any())?,
                username: row.try_get("username").map_err(|e| e.any())?,
                current_session: row.try_get("current_session_id").map_err(|e| e.any())?,
            },
        })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        let row = query("SELECT id, username, current_session_id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?;

        Self::user_from_row(&row)
    }

    async fn user_by_token(&self, token: &str) -> Result<UserData> {
        let row = query(
            "
            SELECT users.id, users.username, users.current_session_id
            FROM auth_tokens
                INNER JOIN users ON users.id = auth_tokens.user_id
            WHERE auth_tokens.token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "token"))?;

        Self::user_from_row(&row)
    }

    async fn set_current_session(
        &self,
        user_id: PrimaryKey,
        session_id: Option<PrimaryKey>,
    ) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        query("UPDATE users SET current_session_id = $1 WHERE id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn session_by_id(&self, session_id: PrimaryKey) -> Result<SessionData> {
        let row = query(
            "
            SELECT
                sessions.*,
                users.username AS host_username,
                users.current_session_id AS host_session_id
            FROM sessions
                INNER JOIN users ON users.id = sessions.host_id
            WHERE sessions.id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "id"))?;

        Self::session_from_row(&row)
    }

    async fn session_by_join_code(&self, join_code: &str) -> Result<SessionData> {
        let row = query("SELECT id FROM sessions WHERE join_code = $1")
            .bind(join_code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "join_code"))?;

        self.session_by_id(row.try_get("id").map_err(|e| e.any())?)
            .await
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_join_code(&new_session.join_code)
            .await
            .conflict_or_ok("session", "join_code", &new_session.join_code)?;

        // The pre-check above gives the common duplicate a clean error; the
        // unique index catches the race between check and insert
        let row = query("INSERT INTO sessions (join_code, host_id) VALUES ($1, $2) RETURNING id")
            .bind(&new_session.join_code)
            .bind(new_session.host_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                SqlxError::Database(db) if db.is_unique_violation() => DatabaseError::Conflict {
                    resource: "session",
                    field: "join_code",
                    value: new_session.join_code.clone(),
                },
                _ => e.any(),
            })?;

        self.session_by_id(row.try_get("id").map_err(|e| e.any())?)
            .await
    }

    async fn set_locked(&self, session_id: PrimaryKey, locked: bool) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_id(session_id).await?;

        query("UPDATE sessions SET locked = $1 WHERE id = $2")
            .bind(locked)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn session_members(&self, session_id: PrimaryKey) -> Result<Vec<UserData>> {
        let rows = query(
            "SELECT id, username, current_session_id FROM users WHERE current_session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(Self::user_from_row).collect()
    }

    async fn upsert_track(&self, new_track: NewTrack) -> Result<TrackData> {
        let row = query(
            "
            INSERT INTO tracks (external_id, source, title, artist, album, duration_ms, artwork, isrc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (external_id) DO UPDATE SET
                title = EXCLUDED.title,
                artist = EXCLUDED.artist,
                album = EXCLUDED.album,
                duration_ms = EXCLUDED.duration_ms,
                artwork = EXCLUDED.artwork,
                isrc = EXCLUDED.isrc
            RETURNING *",
        )
        .bind(&new_track.external_id)
        .bind(new_track.source.as_str())
        .bind(&new_track.title)
        .bind(&new_track.artist)
        .bind(&new_track.album)
        .bind(new_track.duration_ms)
        .bind(&new_track.artwork)
        .bind(&new_track.isrc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let source: String = row.try_get("source").map_err(|e| e.any())?;

        Ok(TrackData {
            external_id: row.try_get("external_id").map_err(|e| e.any())?,
            source: TrackSource::from_str(&source).map_err(DatabaseError::internal)?,
            title: row.try_get("title").map_err(|e| e.any())?,
            artist: row.try_get("artist").map_err(|e| e.any())?,
            album: row.try_get("album").map_err(|e| e.any())?,
            duration_ms: row.try_get("duration_ms").map_err(|e| e.any())?,
            artwork: row.try_get("artwork").map_err(|e| e.any())?,
            isrc: row.try_get("isrc").map_err(|e| e.any())?,
        })
    }

    async fn create_entry(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData> {
        let row = query(
            "
            INSERT INTO queue_entries (session_id, track_external_id, added_by_id)
            VALUES ($1, $2, $3)
            RETURNING id",
        )
        .bind(new_entry.session_id)
        .bind(&new_entry.track_external_id)
        .bind(new_entry.added_by_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.entry_by_id(row.try_get("id").map_err(|e| e.any())?)
            .await
    }

    async fn entry_by_id(&self, entry_id: PrimaryKey) -> Result<QueueEntryData> {
        let row = query(&format!("{} WHERE entries.id = $1", ENTRY_SELECT))
            .bind(entry_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("queue entry", "id"))?;

        Self::entry_from_row(&row)
    }

    async fn list_queue_entries(&self, session_id: PrimaryKey) -> Result<Vec<QueueEntryData>> {
        let rows = query(&format!(
            "{} WHERE entries.session_id = $1 AND entries.status = 'queued'",
            ENTRY_SELECT
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn update_entry_status(&self, entry_id: PrimaryKey, status: EntryStatus) -> Result<()> {
        // Ensure entry exists
        let _ = self.entry_by_id(entry_id).await?;

        query("UPDATE queue_entries SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn upsert_vote(
        &self,
        entry_id: PrimaryKey,
        user_id: PrimaryKey,
        value: i32,
    ) -> Result<i64> {
        query(
            "
            INSERT INTO votes (entry_id, user_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (entry_id, user_id) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(entry_id)
        .bind(user_id)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        query_scalar("SELECT COALESCE(SUM(value), 0)::BIGINT FROM votes WHERE entry_id = $1")
            .bind(entry_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn advance_current(
        &self,
        session_id: PrimaryKey,
        previous: Option<(PrimaryKey, EntryStatus)>,
        next: Option<PrimaryKey>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        // The repoint doubles as the race guard: it only matches while the
        // slot still holds the entry the caller snapshotted
        let result = query(
            "
            UPDATE sessions SET current_entry_id = $1
            WHERE id = $2 AND current_entry_id IS NOT DISTINCT FROM $3",
        )
        .bind(next)
        .bind(session_id)
        .bind(previous.map(|(entry_id, _)| entry_id))
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some((entry_id, status)) = previous {
            query("UPDATE queue_entries SET status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(entry_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        if let Some(entry_id) = next {
            query("UPDATE queue_entries SET status = 'playing' WHERE id = $1")
                .bind(entry_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        tx.commit().await.map_err(|e| e.any())?;

        Ok(true)
    }

    async fn promote_if_idle(&self, session_id: PrimaryKey, entry_id: PrimaryKey) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let result = query(
            "UPDATE sessions SET current_entry_id = $1 WHERE id = $2 AND current_entry_id IS NULL",
        )
        .bind(entry_id)
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        query("UPDATE queue_entries SET status = 'playing' WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(true)
    }
}

impl DatabaseError {
    fn internal(message: String) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
