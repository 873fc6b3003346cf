//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use chrono::{DateTime, Utc};
use queueit_collab::{
    NewTrack, QueueEntryData, SessionData, SessionView as CollabSessionView, TrackData, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i32,
    username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Track {
    /// The track's identifier at its source, such as a Spotify track id
    id: String,
    source: String,
    title: String,
    artist: String,
    album: String,
    duration_ms: i32,
    artwork: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueEntry {
    id: i32,
    status: String,
    votes: i64,
    added_at: DateTime<Utc>,
    track: Track,
    added_by: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Session {
    id: i32,
    join_code: String,
    host: User,
    locked: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    session: Session,
    /// The entry currently occupying the now playing slot
    current: Option<QueueEntry>,
    /// The pending queue in its deterministic order
    queue: Vec<QueueEntry>,
    members: Vec<User>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteCount {
    pub entry_id: i32,
    pub total: i64,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

impl ToSerialized<Track> for TrackData {
    fn to_serialized(&self) -> Track {
        Track {
            id: self.external_id.clone(),
            source: self.source.to_string(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            artwork: self.artwork.clone(),
        }
    }
}

impl ToSerialized<Track> for NewTrack {
    fn to_serialized(&self) -> Track {
        Track {
            id: self.external_id.clone(),
            source: self.source.to_string(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            artwork: self.artwork.clone(),
        }
    }
}

impl ToSerialized<QueueEntry> for QueueEntryData {
    fn to_serialized(&self) -> QueueEntry {
        QueueEntry {
            id: self.id,
            status: self.status.to_string(),
            votes: self.votes,
            added_at: self.added_at,
            track: self.track.to_serialized(),
            added_by: self.added_by.to_serialized(),
        }
    }
}

impl ToSerialized<Session> for SessionData {
    fn to_serialized(&self) -> Session {
        Session {
            id: self.id,
            join_code: self.join_code.clone(),
            host: self.host.to_serialized(),
            locked: self.locked,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<SessionView> for CollabSessionView {
    fn to_serialized(&self) -> SessionView {
        SessionView {
            session: self.session.to_serialized(),
            current: self.current.to_serialized(),
            queue: self.queue.to_serialized(),
            members: self.members.to_serialized(),
        }
    }
}
