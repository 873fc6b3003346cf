use crossbeam::channel::{Receiver, Sender};

use crate::PrimaryKey;

pub type EventSender = Sender<CoordinatorEvent>;
pub type EventReceiver = Receiver<CoordinatorEvent>;

/// Events emitted after committed mutations. Delivery to clients is
/// at-least-once and lossy, so every event is a pure signal to re-fetch the
/// session view, never a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// The pending queue of a session changed
    QueueUpdate { session_id: PrimaryKey },
    /// Vote totals within a session changed
    VotesUpdate { session_id: PrimaryKey },
    /// The now playing slot of a session changed
    NowPlayingUpdate { session_id: PrimaryKey },
    /// Session metadata or membership changed
    SessionUpdate { session_id: PrimaryKey },
}

impl CoordinatorEvent {
    pub fn session_id(&self) -> PrimaryKey {
        match self {
            Self::QueueUpdate { session_id }
            | Self::VotesUpdate { session_id }
            | Self::NowPlayingUpdate { session_id }
            | Self::SessionUpdate { session_id } => *session_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueueUpdate { .. } => "queue",
            Self::VotesUpdate { .. } => "votes",
            Self::NowPlayingUpdate { .. } => "now_playing",
            Self::SessionUpdate { .. } => "session",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{track, TestBed};
    use crate::CoordinatorEvent;

    #[tokio::test]
    async fn mutations_emit_refresh_signals() {
        let bed = TestBed::new();
        let host = bed.db.add_user("ana");
        let events = bed.coordinator.events();

        let view = bed
            .coordinator
            .sessions
            .create_session(&host, None)
            .await
            .expect("session is created");

        let host = bed.user(host.id).await;

        bed.coordinator
            .queues
            .enqueue(&host, track("t1"))
            .await
            .expect("entry is enqueued");

        let received: Vec<CoordinatorEvent> = events.try_iter().collect();
        let kinds: Vec<_> = received.iter().map(|e| e.kind()).collect();

        assert_eq!(kinds, vec!["session", "queue", "now_playing"]);

        for event in received {
            assert_eq!(event.session_id(), view.session.id);
        }
    }
}
