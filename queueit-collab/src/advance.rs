use log::{info, warn};

use crate::{
    order_entries, CoordinatorContext, CoordinatorError, CoordinatorEvent, EntryStatus,
    PrimaryKey, QueueEntryData, SessionData, UserData,
};

/// Decides which entry occupies the now playing slot and when. Only the
/// host drives the slot, so two clients can never race to advance the same
/// session; everyone else gets [CoordinatorError::NotHost].
pub struct AdvancementController {
    context: CoordinatorContext,
}

impl AdvancementController {
    pub fn new(context: &CoordinatorContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Host skip: the playing entry is marked skipped and the head of the
    /// pending queue takes its place
    pub async fn skip(&self, caller: &UserData) -> Result<(), CoordinatorError> {
        let session = self.current_hosted_session(caller).await?;
        self.advance(&session, EntryStatus::Skipped).await
    }

    /// Natural completion signal from the host's player. The playback side
    /// may deliver these late or more than once, so a signal naming an
    /// entry that is no longer playing is treated as stale and swallowed.
    pub async fn entry_finished(
        &self,
        caller: &UserData,
        entry_id: PrimaryKey,
    ) -> Result<(), CoordinatorError> {
        let session = self.current_hosted_session(caller).await?;

        if session.current_entry != Some(entry_id) {
            warn!(
                "Ignoring stale completion signal for entry {} in session {}",
                entry_id, session.id
            );
            return Ok(());
        }

        self.advance(&session, EntryStatus::Played).await
    }

    async fn current_hosted_session(
        &self,
        caller: &UserData,
    ) -> Result<SessionData, CoordinatorError> {
        let session_id = caller
            .current_session
            .ok_or(CoordinatorError::SessionNotFound)?;

        let session = self
            .context
            .database
            .session_by_id(session_id)
            .await
            .map_err(CoordinatorError::session_from)?;

        if !session.is_host(caller.id) {
            return Err(CoordinatorError::NotHost);
        }

        Ok(session)
    }

    /// Marks the current entry with its terminal status, then runs
    /// next-selection: the head of the pending queue is promoted to
    /// playing, or the slot is cleared if the queue ran dry. Both writes
    /// and the session repoint commit as one store transaction.
    async fn advance(
        &self,
        session: &SessionData,
        mark_as: EntryStatus,
    ) -> Result<(), CoordinatorError> {
        let previous = match session.current_entry {
            Some(entry_id) => {
                let entry = self.context.database.entry_by_id(entry_id).await?;

                if !entry.status.can_become(mark_as) {
                    return Err(CoordinatorError::InvalidTransition {
                        from: entry.status,
                        to: mark_as,
                    });
                }

                Some((entry_id, mark_as))
            }
            None => None,
        };

        let next = next_in_queue(&self.context, session.id).await?;

        let applied = self
            .context
            .database
            .advance_current(session.id, previous, next.as_ref().map(|e| e.id))
            .await?;

        // A concurrent advancement won the race; this signal is stale
        if !applied {
            warn!(
                "Ignoring concurrent advancement attempt in session {}",
                session.id
            );
            return Ok(());
        }

        match &next {
            Some(entry) => info!(
                "Session {} advanced to entry {} ({})",
                session.join_code, entry.id, entry.track.title
            ),
            None => info!("Session {} ran out of entries", session.join_code),
        }

        self.context.emit(CoordinatorEvent::NowPlayingUpdate {
            session_id: session.id,
        });
        self.context.emit(CoordinatorEvent::QueueUpdate {
            session_id: session.id,
        });

        Ok(())
    }
}

/// The head of the deterministic queue order, if any
async fn next_in_queue(
    context: &CoordinatorContext,
    session_id: PrimaryKey,
) -> Result<Option<QueueEntryData>, CoordinatorError> {
    let mut entries = context.database.list_queue_entries(session_id).await?;
    order_entries(&mut entries);

    Ok(entries.into_iter().next())
}

/// Runs next-selection when the playing slot is empty, so the first entry
/// enqueued into an idle session starts immediately. The store applies the
/// promotion only if the slot is still empty, which keeps concurrent
/// enqueues from promoting twice.
pub(crate) async fn promote_if_idle(
    context: &CoordinatorContext,
    session: &SessionData,
) -> Result<(), CoordinatorError> {
    if session.current_entry.is_some() {
        return Ok(());
    }

    if let Some(head) = next_in_queue(context, session.id).await? {
        if context
            .database
            .promote_if_idle(session.id, head.id)
            .await?
        {
            info!(
                "Session {} started playing entry {} ({})",
                session.join_code, head.id, head.track.title
            );
            context.emit(CoordinatorEvent::NowPlayingUpdate {
                session_id: session.id,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{track, TestBed};
    use crate::{CoordinatorError, Database, EntryStatus, PrimaryKey, UserData};

    /// Creates a session with a host, a guest, and three entries: t1 in the
    /// playing slot, t2 and t3 pending.
    async fn seeded_session(bed: &TestBed) -> (UserData, UserData, Vec<PrimaryKey>) {
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

        let mut entry_ids = vec![];
        for id in ["t1", "t2", "t3"] {
            let entry = bed
                .coordinator
                .queues
                .enqueue(&host, track(id))
                .await
                .expect("entry is enqueued");
            entry_ids.push(entry.id);
        }

        (host, guest, entry_ids)
    }

    async fn status_of(bed: &TestBed, entry_id: PrimaryKey) -> EntryStatus {
        bed.db
            .entry_by_id(entry_id)
            .await
            .expect("entry exists")
            .status
    }

    #[tokio::test]
    async fn host_skip_promotes_next() {
        let bed = TestBed::new();
        let (host, _, entries) = seeded_session(&bed).await;

        bed.coordinator
            .advancement
            .skip(&host)
            .await
            .expect("host skips");

        assert_eq!(status_of(&bed, entries[0]).await, EntryStatus::Skipped);
        assert_eq!(status_of(&bed, entries[1]).await, EntryStatus::Playing);
        assert_eq!(status_of(&bed, entries[2]).await, EntryStatus::Queued);

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.session.current_entry, Some(entries[1]));
    }

    #[tokio::test]
    async fn skip_with_empty_remainder_clears_slot() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");

        bed.coordinator
            .sessions
            .create_session(&host, None)
            .await
            .expect("session is created");

        let host = bed.user(host.id).await;
        let only = bed
            .coordinator
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("entry is enqueued");

        bed.coordinator
            .advancement
            .skip(&host)
            .await
            .expect("host skips");

        assert_eq!(status_of(&bed, only.id).await, EntryStatus::Skipped);

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.session.current_entry, None);
        assert!(view.current.is_none());
    }

    #[tokio::test]
    async fn non_host_skip_is_refused() {
        let bed = TestBed::new();
        let (host, guest, entries) = seeded_session(&bed).await;

        let result = bed.coordinator.advancement.skip(&guest).await;
        assert!(matches!(result, Err(CoordinatorError::NotHost)));

        // Nothing moved
        assert_eq!(status_of(&bed, entries[0]).await, EntryStatus::Playing);
        assert_eq!(status_of(&bed, entries[1]).await, EntryStatus::Queued);

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.session.current_entry, Some(entries[0]));
    }

    #[tokio::test]
    async fn natural_completion_marks_played() {
        let bed = TestBed::new();
        let (host, _, entries) = seeded_session(&bed).await;

        bed.coordinator
            .advancement
            .entry_finished(&host, entries[0])
            .await
            .expect("completion is handled");

        assert_eq!(status_of(&bed, entries[0]).await, EntryStatus::Played);
        assert_eq!(status_of(&bed, entries[1]).await, EntryStatus::Playing);
    }

    #[tokio::test]
    async fn stale_completion_signals_are_ignored() {
        let bed = TestBed::new();
        let (host, _, entries) = seeded_session(&bed).await;

        bed.coordinator
            .advancement
            .entry_finished(&host, entries[0])
            .await
            .expect("completion is handled");

        // The playback side delivers the same signal again
        bed.coordinator
            .advancement
            .entry_finished(&host, entries[0])
            .await
            .expect("duplicate signal is swallowed");

        // No second advancement happened
        assert_eq!(status_of(&bed, entries[1]).await, EntryStatus::Playing);
        assert_eq!(status_of(&bed, entries[2]).await, EntryStatus::Queued);

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.session.current_entry, Some(entries[1]));
    }

    #[tokio::test]
    async fn racing_completion_signals_advance_once() {
        let bed = TestBed::new();
        let (host, _, entries) = seeded_session(&bed).await;
        let session_id = host.current_session.expect("host is in a session");

        // Two handlers race on the same completion signal: both snapshot t1
        // as current before either commits, then each tries to promote its
        // own pick. Only the first compare-and-swap may apply.
        let first = bed
            .db
            .advance_current(
                session_id,
                Some((entries[0], EntryStatus::Played)),
                Some(entries[1]),
            )
            .await
            .expect("first advancement commits");
        let second = bed
            .db
            .advance_current(
                session_id,
                Some((entries[0], EntryStatus::Played)),
                Some(entries[2]),
            )
            .await
            .expect("second advancement is handled");

        assert!(first);
        assert!(!second);

        assert_eq!(status_of(&bed, entries[0]).await, EntryStatus::Played);
        assert_eq!(status_of(&bed, entries[1]).await, EntryStatus::Playing);
        assert_eq!(status_of(&bed, entries[2]).await, EntryStatus::Queued);

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.session.current_entry, Some(entries[1]));
    }

    #[tokio::test]
    async fn votes_decide_the_next_entry() {
        let bed = TestBed::new();
        let (host, guest, entries) = seeded_session(&bed).await;

        bed.coordinator
            .votes
            .cast_vote(&guest, entries[2], 1)
            .await
            .expect("vote is cast");

        bed.coordinator
            .advancement
            .entry_finished(&host, entries[0])
            .await
            .expect("completion is handled");

        // t3 outvoted t2 despite being added later
        assert_eq!(status_of(&bed, entries[2]).await, EntryStatus::Playing);
        assert_eq!(status_of(&bed, entries[1]).await, EntryStatus::Queued);
    }

    #[tokio::test]
    async fn at_most_one_entry_plays() {
        let bed = TestBed::new();
        let (host, guest, entries) = seeded_session(&bed).await;

        bed.coordinator
            .votes
            .cast_vote(&guest, entries[1], -1)
            .await
            .expect("vote is cast");
        bed.coordinator
            .advancement
            .skip(&host)
            .await
            .expect("host skips");
        bed.coordinator
            .advancement
            .entry_finished(&host, entries[2])
            .await
            .expect("completion is handled");

        let host = bed.user(host.id).await;
        let extra = bed
            .coordinator
            .queues
            .enqueue(&host, track("t4"))
            .await
            .expect("entry is enqueued");

        let mut all_ids = entries.clone();
        all_ids.push(extra.id);

        let mut playing = vec![];
        for id in all_ids {
            if status_of(&bed, id).await == EntryStatus::Playing {
                playing.push(id);
            }
        }

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(playing.len(), 1);
        assert_eq!(view.session.current_entry, Some(playing[0]));
    }
}
