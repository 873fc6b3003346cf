use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSessionSchema {
    /// A custom join code. One is generated when omitted.
    #[validate(length(min = 4, max = 20))]
    pub join_code: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinSessionSchema {
    #[validate(length(min = 1, max = 20))]
    pub join_code: String,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum SessionActionSchema {
    Lock,
    Unlock,
    Skip,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FinishedSchema {
    pub entry_id: i32,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSongSchema {
    /// The track's identifier at its source, or a track link or uri
    #[validate(length(min = 1, max = 256))]
    pub id: String,
    /// Defaults to spotify when omitted
    pub source: Option<String>,
    #[validate(length(min = 1, max = 512))]
    pub title: String,
    #[validate(length(max = 512))]
    pub artist: String,
    #[validate(length(max = 512))]
    pub album: String,
    #[validate(range(min = 0))]
    pub duration_ms: i32,
    pub artwork: Option<String>,
    pub isrc: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteSchema {
    /// +1 or -1
    pub value: i32,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
