use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Identity,
    context::ServerContext,
    errors::ServerResult,
    serialized::{ToSerialized, Track},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Free text to search the track catalog with
    query: String,
}

#[utoipa::path(
    get,
    path = "/v1/tracks/search",
    tag = "tracks",
    params(SearchQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Track>)
    )
)]
async fn search(
    _identity: Identity,
    State(context): State<ServerContext>,
    Query(params): Query<SearchQuery>,
) -> ServerResult<Json<Vec<Track>>> {
    let results = context.catalog.search(&params.query).await?;

    Ok(Json(results.to_serialized()))
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/search", get(search))
}
