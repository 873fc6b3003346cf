use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use queueit_collab::UserData;

use crate::context::ServerContext;

/// The verified caller resolved from the request's bearer token
pub struct Identity(UserData);

impl Identity {
    pub fn user(&self) -> &UserData {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Identity {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let user = state
            .coordinator
            .user_from_token(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token"))?;

        Ok(Self(user))
    }
}
