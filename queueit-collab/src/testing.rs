//! Shared helpers for the engine's test suite

use std::sync::Arc;

use crate::{Coordinator, Database, MemoryDatabase, NewTrack, PrimaryKey, TrackSource, UserData};

/// A coordinator wired to an in-memory store, with direct access to the
/// store for seeding and inspection
pub struct TestBed {
    pub db: MemoryDatabase,
    pub coordinator: Coordinator,
}

impl TestBed {
    pub fn new() -> Self {
        let db = MemoryDatabase::new();
        let coordinator = Coordinator::new(Arc::new(db.clone()));

        Self { db, coordinator }
    }

    /// Re-reads a user, picking up membership changes
    pub async fn user(&self, id: PrimaryKey) -> UserData {
        self.db.user_by_id(id).await.expect("user exists")
    }
}

pub fn track(external_id: &str) -> NewTrack {
    NewTrack {
        external_id: external_id.to_string(),
        source: TrackSource::Spotify,
        title: format!("Track {}", external_id),
        artist: "Test Artist".to_string(),
        album: "Test Album".to_string(),
        duration_ms: 180_000,
        artwork: None,
        isrc: None,
    }
}
