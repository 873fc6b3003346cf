mod advance;
mod catalog;
mod db;
mod events;
mod queues;
mod sessions;
mod track;
mod util;
mod votes;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use thiserror::Error;

pub use advance::*;
pub use catalog::*;
pub use db::*;
pub use events::*;
pub use queues::*;
pub use sessions::*;
pub use track::*;
pub use votes::*;

/// The queueit coordination engine, facilitating session membership, the
/// queue entry lifecycle, vote aggregation, and advancement of the
/// now playing slot.
pub struct Coordinator {
    context: CoordinatorContext,
    receiver: EventReceiver,

    pub sessions: SessionManager,
    pub queues: QueueManager,
    pub votes: VoteLedger,
    pub advancement: AdvancementController,
}

/// A type passed to the engine's components, to access the store and emit
/// change notifications.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub database: Arc<dyn Database>,
    events: EventSender,
}

/// Everything that can go wrong with a coordination operation. All of these
/// are terminal for the triggering operation and surfaced to the caller
/// as-is; there are no retries at this layer.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No or invalid caller identity")]
    Unauthenticated,
    #[error("Only the host may perform this action")]
    NotHost,
    #[error("Session doesn't exist, or caller is not a member of it")]
    SessionNotFound,
    #[error("User is already in an active session")]
    AlreadyInSession,
    #[error("Join code {0} is already in use")]
    DuplicateJoinCode(String),
    #[error("The queue is locked by the host")]
    SessionLocked,
    #[error("A queue entry can't move from {from} to {to}")]
    InvalidTransition {
        from: EntryStatus,
        to: EntryStatus,
    },
    #[error("A vote must be +1 or -1, got {0}")]
    InvalidVoteValue(i32),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl Coordinator {
    pub fn new(database: Arc<dyn Database>) -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();

        let context = CoordinatorContext {
            database,
            events: sender,
        };

        Self {
            sessions: SessionManager::new(&context),
            queues: QueueManager::new(&context),
            votes: VoteLedger::new(&context),
            advancement: AdvancementController::new(&context),
            context,
            receiver,
        }
    }

    /// Returns a receiver of the engine's change notifications
    pub fn events(&self) -> EventReceiver {
        self.receiver.clone()
    }

    /// Resolves a verified caller identity from an opaque bearer token
    pub async fn user_from_token(
        &self,
        token: &str,
    ) -> std::result::Result<UserData, CoordinatorError> {
        self.context
            .database
            .user_by_token(token)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => CoordinatorError::Unauthenticated,
                e => e.into(),
            })
    }
}

impl CoordinatorContext {
    pub(crate) fn emit(&self, event: CoordinatorEvent) {
        // Nothing to do if no one is listening
        let _ = self.events.send(event);
    }
}

impl CoordinatorError {
    /// Maps a store miss onto the session lifecycle taxonomy
    pub(crate) fn session_from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound {
                resource: _,
                identifier: _,
            } => Self::SessionNotFound,
            e => e.into(),
        }
    }
}
