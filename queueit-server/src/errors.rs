use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use queueit_collab::{CatalogError, CoordinatorError, DatabaseError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    BadRequest(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Coordinator(e) => match e {
                CoordinatorError::Unauthenticated => StatusCode::UNAUTHORIZED,
                CoordinatorError::NotHost => StatusCode::FORBIDDEN,
                CoordinatorError::SessionNotFound => StatusCode::NOT_FOUND,
                CoordinatorError::AlreadyInSession
                | CoordinatorError::DuplicateJoinCode(_)
                | CoordinatorError::InvalidTransition { .. } => StatusCode::CONFLICT,
                CoordinatorError::SessionLocked => StatusCode::LOCKED,
                CoordinatorError::InvalidVoteValue(_) => StatusCode::BAD_REQUEST,
                CoordinatorError::Db(e) => match e {
                    DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
                    DatabaseError::Conflict { .. } => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
            Self::Catalog(e) => match e {
                CatalogError::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queueit_collab::EntryStatus;

    #[test]
    fn coordinator_errors_map_to_sensible_codes() {
        let cases = [
            (CoordinatorError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CoordinatorError::NotHost, StatusCode::FORBIDDEN),
            (CoordinatorError::SessionNotFound, StatusCode::NOT_FOUND),
            (CoordinatorError::AlreadyInSession, StatusCode::CONFLICT),
            (
                CoordinatorError::DuplicateJoinCode("PARTY1".to_string()),
                StatusCode::CONFLICT,
            ),
            (CoordinatorError::SessionLocked, StatusCode::LOCKED),
            (
                CoordinatorError::InvalidTransition {
                    from: EntryStatus::Played,
                    to: EntryStatus::Playing,
                },
                StatusCode::CONFLICT,
            ),
            (
                CoordinatorError::InvalidVoteValue(0),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ServerError::from(error).as_status_code(), expected);
        }
    }
}
