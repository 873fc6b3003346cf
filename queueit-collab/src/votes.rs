use crate::{CoordinatorContext, CoordinatorError, CoordinatorEvent, PrimaryKey, UserData};

/// Records one signed vote per (participant, queue entry) pair. Totals are
/// always the live sum over the ledger, recomputed on read, so they can
/// never drift from the recorded votes.
pub struct VoteLedger {
    context: CoordinatorContext,
}

impl VoteLedger {
    pub fn new(context: &CoordinatorContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Casts or replaces the caller's vote on a queue entry and returns the
    /// entry's recomputed total. A repeated vote from the same participant
    /// overwrites the prior value; votes from distinct participants are
    /// independent.
    pub async fn cast_vote(
        &self,
        caller: &UserData,
        entry_id: PrimaryKey,
        value: i32,
    ) -> Result<i64, CoordinatorError> {
        if value != 1 && value != -1 {
            return Err(CoordinatorError::InvalidVoteValue(value));
        }

        let entry = self.context.database.entry_by_id(entry_id).await?;

        if caller.current_session != Some(entry.session_id) {
            return Err(CoordinatorError::SessionNotFound);
        }

        let total = self
            .context
            .database
            .upsert_vote(entry_id, caller.id, value)
            .await?;

        self.context.emit(CoordinatorEvent::VotesUpdate {
            session_id: entry.session_id,
        });

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{track, TestBed};
    use crate::CoordinatorError;

    #[tokio::test]
    async fn latest_vote_per_participant_wins() {
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

        let entry = bed
            .coordinator
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("entry is enqueued");

        let total = bed
            .coordinator
            .votes
            .cast_vote(&host, entry.id, 1)
            .await
            .expect("host votes");
        assert_eq!(total, 1);

        let total = bed
            .coordinator
            .votes
            .cast_vote(&guest, entry.id, 1)
            .await
            .expect("guest votes");
        assert_eq!(total, 2);

        // The guest changes their mind; only the latest value counts
        let total = bed
            .coordinator
            .votes
            .cast_vote(&guest, entry.id, -1)
            .await
            .expect("guest re-votes");
        assert_eq!(total, 0);

        let total = bed
            .coordinator
            .votes
            .cast_vote(&guest, entry.id, -1)
            .await
            .expect("guest re-votes again");
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn rejects_out_of_range_values() {
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

        for value in [0, 2, -2, 100] {
            let result = bed.coordinator.votes.cast_vote(&host, entry.id, value).await;

            assert!(matches!(
                result,
                Err(CoordinatorError::InvalidVoteValue(v)) if v == value
            ));
        }
    }

    #[tokio::test]
    async fn voting_requires_membership() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");
        let outsider = bed.db.add_user("ben");

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

        let result = bed.coordinator.votes.cast_vote(&outsider, entry.id, 1).await;
        assert!(matches!(result, Err(CoordinatorError::SessionNotFound)));
    }

    #[tokio::test]
    async fn totals_are_recomputed_on_read() {
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
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("t1 is enqueued");
        let pending = bed
            .coordinator
            .queues
            .enqueue(&host, track("t2"))
            .await
            .expect("t2 is enqueued");

        bed.coordinator
            .votes
            .cast_vote(&host, pending.id, -1)
            .await
            .expect("host votes");
        bed.coordinator
            .votes
            .cast_vote(&guest, pending.id, -1)
            .await
            .expect("guest votes");

        let view = bed
            .coordinator
            .sessions
            .current_view(&host)
            .await
            .expect("view is built");

        assert_eq!(view.queue[0].id, pending.id);
        assert_eq!(view.queue[0].votes, -2);
    }
}
