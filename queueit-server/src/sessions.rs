use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use crate::{
    auth::Identity,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        FinishedSchema, JoinSessionSchema, NewSessionSchema, SessionActionSchema, ValidatedJson,
    },
    serialized::{SessionView, ToSerialized},
};

#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "sessions",
    request_body = NewSessionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SessionView)
    )
)]
async fn create_session(
    identity: Identity,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewSessionSchema>,
) -> ServerResult<Json<SessionView>> {
    let view = context
        .coordinator
        .sessions
        .create_session(identity.user(), body.join_code)
        .await?;

    Ok(Json(view.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/join",
    tag = "sessions",
    request_body = JoinSessionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SessionView)
    )
)]
async fn join_session(
    identity: Identity,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<JoinSessionSchema>,
) -> ServerResult<Json<SessionView>> {
    let view = context
        .coordinator
        .sessions
        .join_session(identity.user(), &body.join_code)
        .await?;

    Ok(Json(view.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/leave",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Caller is no longer a member of their session")
    )
)]
async fn leave_session(
    identity: Identity,
    State(context): State<ServerContext>,
) -> ServerResult<()> {
    context
        .coordinator
        .sessions
        .leave_session(identity.user())
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/sessions/current",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SessionView)
    )
)]
async fn current_session(
    identity: Identity,
    State(context): State<ServerContext>,
) -> ServerResult<Json<SessionView>> {
    let view = context
        .coordinator
        .sessions
        .current_view(identity.user())
        .await?;

    Ok(Json(view.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/actions",
    tag = "sessions",
    request_body = SessionActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Action was performed")
    )
)]
async fn perform_session_action(
    identity: Identity,
    State(context): State<ServerContext>,
    Json(body): Json<SessionActionSchema>,
) -> ServerResult<()> {
    match body {
        SessionActionSchema::Lock => {
            context
                .coordinator
                .sessions
                .set_locked(identity.user(), true)
                .await?
        }
        SessionActionSchema::Unlock => {
            context
                .coordinator
                .sessions
                .set_locked(identity.user(), false)
                .await?
        }
        SessionActionSchema::Skip => context.coordinator.advancement.skip(identity.user()).await?,
    };

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/sessions/finished",
    tag = "sessions",
    request_body = FinishedSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Completion signal was handled")
    )
)]
async fn entry_finished(
    identity: Identity,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<FinishedSchema>,
) -> ServerResult<()> {
    context
        .coordinator
        .advancement
        .entry_finished(identity.user(), body.entry_id)
        .await?;

    Ok(())
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/", post(create_session))
        .route("/join", post(join_session))
        .route("/leave", post(leave_session))
        .route("/current", get(current_session))
        .route("/actions", post(perform_session_action))
        .route("/finished", post(entry_finished))
}
