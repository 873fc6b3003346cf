use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use queueit_collab::{NewTrack, TrackSource};

use crate::{
    auth::Identity,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{NewSongSchema, ValidatedJson, VoteSchema},
    serialized::{QueueEntry, ToSerialized, VoteCount},
};

#[utoipa::path(
    post,
    path = "/v1/songs",
    tag = "songs",
    request_body = NewSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = QueueEntry)
    )
)]
async fn add_song(
    identity: Identity,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewSongSchema>,
) -> ServerResult<Json<QueueEntry>> {
    let entry = context
        .coordinator
        .queues
        .enqueue(identity.user(), new_track_from(body)?)
        .await?;

    Ok(Json(entry.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/songs/{id}/vote",
    tag = "songs",
    request_body = VoteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = VoteCount)
    )
)]
async fn vote(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(entry_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<Json<VoteCount>> {
    let total = context
        .coordinator
        .votes
        .cast_vote(identity.user(), entry_id, body.value)
        .await?;

    Ok(Json(VoteCount { entry_id, total }))
}

fn new_track_from(body: NewSongSchema) -> ServerResult<NewTrack> {
    let source = match &body.source {
        Some(source) => source
            .parse()
            .map_err(|e: String| ServerError::BadRequest(e))?,
        None => TrackSource::default(),
    };

    // Accept spotify links and uris in place of a bare id
    let external_id = match queueit_collab::parse_track_reference(&body.id) {
        Some((parsed_source, id)) if parsed_source == source => id,
        _ => body.id,
    };

    Ok(NewTrack {
        external_id,
        source,
        title: body.title,
        artist: body.artist,
        album: body.album,
        duration_ms: body.duration_ms,
        artwork: body.artwork,
        isrc: body.isrc,
    })
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/", post(add_song))
        .route("/:id/vote", post(vote))
}
