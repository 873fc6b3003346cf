use std::cmp::Ordering;

use crate::{
    advance, CoordinatorContext, CoordinatorError, CoordinatorEvent, EntryStatus, NewQueueEntry,
    NewTrack, PrimaryKey, QueueEntryData, UserData,
};

/// Manages the queue entry lifecycle and the deterministic queue order
pub struct QueueManager {
    context: CoordinatorContext,
}

impl QueueManager {
    pub fn new(context: &CoordinatorContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Adds a track to the caller's session queue. The track metadata is
    /// upserted into the shared catalog cache first, so a track is never
    /// duplicated across sessions.
    pub async fn enqueue(
        &self,
        caller: &UserData,
        new_track: NewTrack,
    ) -> Result<QueueEntryData, CoordinatorError> {
        let session_id = caller
            .current_session
            .ok_or(CoordinatorError::SessionNotFound)?;

        let session = self
            .context
            .database
            .session_by_id(session_id)
            .await
            .map_err(CoordinatorError::session_from)?;

        if session.locked && !session.is_host(caller.id) {
            return Err(CoordinatorError::SessionLocked);
        }

        let track = self.context.database.upsert_track(new_track).await?;

        let entry = self
            .context
            .database
            .create_entry(NewQueueEntry {
                session_id,
                added_by_id: caller.id,
                track_external_id: track.external_id,
            })
            .await?;

        self.context
            .emit(CoordinatorEvent::QueueUpdate { session_id });

        // The first entry enqueued into an idle session starts right away
        advance::promote_if_idle(&self.context, &session).await?;

        self.context
            .database
            .entry_by_id(entry.id)
            .await
            .map_err(Into::into)
    }

    /// The pending queue of a session in its deterministic total order
    pub async fn list_queue(
        &self,
        session_id: PrimaryKey,
    ) -> Result<Vec<QueueEntryData>, CoordinatorError> {
        let mut entries = self.context.database.list_queue_entries(session_id).await?;
        order_entries(&mut entries);

        Ok(entries)
    }

    /// Moves an entry along its lifecycle, refusing anything but the
    /// forward transitions
    pub async fn set_status(
        &self,
        entry_id: PrimaryKey,
        new_status: EntryStatus,
    ) -> Result<(), CoordinatorError> {
        let entry = self.context.database.entry_by_id(entry_id).await?;

        if !entry.status.can_become(new_status) {
            return Err(CoordinatorError::InvalidTransition {
                from: entry.status,
                to: new_status,
            });
        }

        self.context
            .database
            .update_entry_status(entry_id, new_status)
            .await?;

        self.context.emit(CoordinatorEvent::QueueUpdate {
            session_id: entry.session_id,
        });

        Ok(())
    }
}

/// Sorts entries into the queue's total order: vote total descending, then
/// creation time ascending, with the entry id as the final disambiguator.
/// Every client converges on this exact order.
pub fn order_entries(entries: &mut [QueueEntryData]) {
    entries.sort_by(compare_entries);
}

fn compare_entries(a: &QueueEntryData, b: &QueueEntryData) -> Ordering {
    b.votes
        .cmp(&a.votes)
        .then_with(|| a.added_at.cmp(&b.added_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use crate::testing::{track, TestBed};
    use crate::{CoordinatorError, EntryStatus};

    #[tokio::test]
    async fn first_entry_starts_playing() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");

        bed.coordinator
            .sessions
            .create_session(&host, None)
            .await
            .expect("session is created");

        let host = bed.user(host.id).await;
        let entry = bed
            .coordinator
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("entry is enqueued");

        assert_eq!(entry.status, EntryStatus::Playing);

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.session.current_entry, Some(entry.id));
        assert_eq!(view.current.expect("an entry is playing").id, entry.id);
        assert!(view.queue.is_empty());
    }

    #[tokio::test]
    async fn votes_order_the_queue() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");
        let guest = bed.db.add_user("ben");

        let view = bed
            .coordinator
            .sessions
            .create_session(&host, Some("PARTY1".to_string()))
            .await
            .expect("session is created");
        bed.coordinator
            .sessions
            .join_session(&guest, "PARTY1")
            .await
            .expect("guest joins");

        let host = bed.user(host.id).await;
        let guest = bed.user(guest.id).await;

        // t1 occupies the playing slot, t2 and t3 stay pending
        bed.coordinator
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("t1 is enqueued");
        let t2 = bed
            .coordinator
            .queues
            .enqueue(&host, track("t2"))
            .await
            .expect("t2 is enqueued");
        let t3 = bed
            .coordinator
            .queues
            .enqueue(&guest, track("t3"))
            .await
            .expect("t3 is enqueued");

        let session_id = view.session.id;
        let pending: Vec<_> = bed
            .coordinator
            .queues
            .list_queue(session_id)
            .await
            .expect("queue is listed")
            .into_iter()
            .map(|e| e.id)
            .collect();

        // Zero votes everywhere, so creation order decides
        assert_eq!(pending, vec![t2.id, t3.id]);

        bed.coordinator
            .votes
            .cast_vote(&guest, t3.id, 1)
            .await
            .expect("vote is cast");

        let pending: Vec<_> = bed
            .coordinator
            .queues
            .list_queue(session_id)
            .await
            .expect("queue is listed")
            .into_iter()
            .map(|e| e.id)
            .collect();

        assert_eq!(pending, vec![t3.id, t2.id]);

        // Listing twice without mutation yields the same order
        let again: Vec<_> = bed
            .coordinator
            .queues
            .list_queue(session_id)
            .await
            .expect("queue is listed")
            .into_iter()
            .map(|e| e.id)
            .collect();

        assert_eq!(pending, again);
    }

    #[tokio::test]
    async fn locked_queue_is_host_only() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");
        let guest = bed.db.add_user("ben");

        bed.coordinator
            .sessions
            .create_session(&host, Some("PARTY1".to_string()))
            .await
            .expect("session is created");
        bed.coordinator
            .sessions
            .join_session(&guest, "PARTY1")
            .await
            .expect("guest joins");

        let host = bed.user(host.id).await;
        let guest = bed.user(guest.id).await;

        bed.coordinator
            .sessions
            .set_locked(&host, true)
            .await
            .expect("host locks");

        let result = bed.coordinator.queues.enqueue(&guest, track("t1")).await;
        assert!(matches!(result, Err(CoordinatorError::SessionLocked)));

        bed.coordinator
            .queues
            .enqueue(&host, track("t2"))
            .await
            .expect("host can still enqueue");
    }

    #[tokio::test]
    async fn enqueue_requires_membership() {
        let bed = TestBed::new();
        let outsider = bed.db.add_user("ana");

        let result = bed.coordinator.queues.enqueue(&outsider, track("t1")).await;
        assert!(matches!(result, Err(CoordinatorError::SessionNotFound)));
    }

    #[tokio::test]
    async fn refuses_backward_transitions() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");

        bed.coordinator
            .sessions
            .create_session(&host, None)
            .await
            .expect("session is created");

        let host = bed.user(host.id).await;
        let playing = bed
            .coordinator
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("t1 is enqueued");

        let result = bed
            .coordinator
            .queues
            .set_status(playing.id, EntryStatus::Queued)
            .await;

        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidTransition {
                from: EntryStatus::Playing,
                to: EntryStatus::Queued,
            })
        ));

        bed.coordinator
            .queues
            .set_status(playing.id, EntryStatus::Played)
            .await
            .expect("playing may finish");

        // Terminal states stay terminal
        let result = bed
            .coordinator
            .queues
            .set_status(playing.id, EntryStatus::Playing)
            .await;

        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidTransition {
                from: EntryStatus::Played,
                to: EntryStatus::Playing,
            })
        ));
    }
}
