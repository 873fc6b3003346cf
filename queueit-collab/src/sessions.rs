use log::info;

use crate::{
    order_entries, util::random_code, CoordinatorContext, CoordinatorError, CoordinatorEvent,
    DatabaseError, NewSession, PrimaryKey, QueueEntryData, SessionData, UserData,
};

/// Length of generated join codes
const JOIN_CODE_LENGTH: usize = 6;

/// Manages session identity, membership, and the lock state
pub struct SessionManager {
    context: CoordinatorContext,
}

/// The full state a client renders a session from. Clients re-fetch this
/// whole view on every change notification instead of applying diffs.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: SessionData,
    /// The entry currently occupying the now playing slot
    pub current: Option<QueueEntryData>,
    /// The pending queue in its deterministic order
    pub queue: Vec<QueueEntryData>,
    pub members: Vec<UserData>,
}

impl SessionManager {
    pub fn new(context: &CoordinatorContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new session hosted by the caller. A join code is generated
    /// when none is supplied.
    pub async fn create_session(
        &self,
        host: &UserData,
        join_code: Option<String>,
    ) -> Result<SessionView, CoordinatorError> {
        if host.current_session.is_some() {
            return Err(CoordinatorError::AlreadyInSession);
        }

        let join_code = join_code.unwrap_or_else(|| random_code(JOIN_CODE_LENGTH));

        let session = self
            .context
            .database
            .create_session(NewSession {
                join_code,
                host_id: host.id,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict {
                    resource: _,
                    field: _,
                    value,
                } => CoordinatorError::DuplicateJoinCode(value),
                e => e.into(),
            })?;

        self.context
            .database
            .set_current_session(host.id, Some(session.id))
            .await?;

        info!("{} created session {}", host.username, session.join_code);
        self.context.emit(CoordinatorEvent::SessionUpdate {
            session_id: session.id,
        });

        self.view(session.id).await
    }

    /// Attaches the caller as a member of the session with the given code
    pub async fn join_session(
        &self,
        user: &UserData,
        join_code: &str,
    ) -> Result<SessionView, CoordinatorError> {
        if user.current_session.is_some() {
            return Err(CoordinatorError::AlreadyInSession);
        }

        let session = self
            .context
            .database
            .session_by_join_code(join_code)
            .await
            .map_err(CoordinatorError::session_from)?;

        self.context
            .database
            .set_current_session(user.id, Some(session.id))
            .await?;

        info!("{} joined session {}", user.username, session.join_code);
        self.context.emit(CoordinatorEvent::SessionUpdate {
            session_id: session.id,
        });

        self.view(session.id).await
    }

    /// Detaches the caller from their current session. The session itself
    /// is left untouched even when the host leaves; what a hostless session
    /// means is a product decision made outside the engine.
    pub async fn leave_session(&self, user: &UserData) -> Result<(), CoordinatorError> {
        let session_id = user
            .current_session
            .ok_or(CoordinatorError::SessionNotFound)?;

        self.context
            .database
            .set_current_session(user.id, None)
            .await?;

        info!("{} left session {}", user.username, session_id);
        self.context
            .emit(CoordinatorEvent::SessionUpdate { session_id });

        Ok(())
    }

    /// Freezes or unfreezes the queue of the caller's session. Host only.
    pub async fn set_locked(
        &self,
        caller: &UserData,
        locked: bool,
    ) -> Result<(), CoordinatorError> {
        let session = self.current_session(caller).await?;

        if !session.is_host(caller.id) {
            return Err(CoordinatorError::NotHost);
        }

        self.context.database.set_locked(session.id, locked).await?;

        info!(
            "{} {} session {}",
            caller.username,
            if locked { "locked" } else { "unlocked" },
            session.join_code
        );
        self.context.emit(CoordinatorEvent::SessionUpdate {
            session_id: session.id,
        });

        Ok(())
    }

    /// Returns the full view of the caller's current session
    pub async fn current_view(&self, caller: &UserData) -> Result<SessionView, CoordinatorError> {
        let session = self.current_session(caller).await?;
        self.view(session.id).await
    }

    /// Builds the view of a session: metadata, the now playing entry, the
    /// ordered pending queue, and the member list. Everything is derived
    /// from current store state, never cached.
    pub async fn view(&self, session_id: PrimaryKey) -> Result<SessionView, CoordinatorError> {
        let session = self
            .context
            .database
            .session_by_id(session_id)
            .await
            .map_err(CoordinatorError::session_from)?;

        let current = match session.current_entry {
            Some(entry_id) => Some(self.context.database.entry_by_id(entry_id).await?),
            None => None,
        };

        let mut queue = self.context.database.list_queue_entries(session_id).await?;
        order_entries(&mut queue);

        let members = self.context.database.session_members(session_id).await?;

        Ok(SessionView {
            session,
            current,
            queue,
            members,
        })
    }

    pub(crate) async fn current_session(
        &self,
        caller: &UserData,
    ) -> Result<SessionData, CoordinatorError> {
        let session_id = caller
            .current_session
            .ok_or(CoordinatorError::SessionNotFound)?;

        self.context
            .database
            .session_by_id(session_id)
            .await
            .map_err(CoordinatorError::session_from)
    }
}
