use std::env;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{NewTrack, TrackSource};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const SEARCH_LIMIT: &str = "5";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog credentials are not configured")]
    Unconfigured,
    #[error("Failed to fetch from catalog: {0}")]
    FetchError(String),
    #[error("Failed to parse catalog response: {0}")]
    ParseError(String),
}

/// An external track catalog that can be searched for candidate tracks.
/// Playback of the returned tracks is the host client's business; the
/// engine only stores the references.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<NewTrack>, CatalogError>;
}

/// Spotify web API catalog, authenticated with the client credentials flow
pub struct SpotifyCatalog {
    client: Client,
    credentials: Option<Credentials>,
    token: Mutex<Option<CachedToken>>,
}

struct Credentials {
    client_id: String,
    client_secret: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    duration_ms: i64,
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    external_ids: Option<SpotifyExternalIds>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyExternalIds {
    isrc: Option<String>,
}

impl SpotifyCatalog {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: Client::new(),
            credentials: Some(Credentials {
                client_id,
                client_secret,
            }),
            token: Mutex::new(None),
        }
    }

    /// Builds a catalog from `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET`.
    /// Without them, searches fail with [CatalogError::Unconfigured].
    pub fn from_env() -> Self {
        let credentials = match (env::var("SPOTIFY_CLIENT_ID"), env::var("SPOTIFY_CLIENT_SECRET"))
        {
            (Ok(client_id), Ok(client_secret)) => Some(Credentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Self {
            client: Client::new(),
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(CatalogError::Unconfigured)?;

        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let response: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::FetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        // Refresh a minute early so in-flight searches don't race expiry
        let expires_at = Instant::now() + Duration::from_secs(response.expires_in.saturating_sub(60));

        *cached = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at,
        });

        Ok(response.access_token)
    }
}

#[async_trait]
impl CatalogProvider for SpotifyCatalog {
    async fn search(&self, query: &str) -> Result<Vec<NewTrack>, CatalogError> {
        let token = self.access_token().await?;

        let response: SearchResponse = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query), ("type", "track"), ("limit", SEARCH_LIMIT)])
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::FetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(response.tracks.items.into_iter().map(Into::into).collect())
    }
}

impl From<SpotifyTrack> for NewTrack {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            external_id: track.id,
            source: TrackSource::Spotify,
            title: track.name,
            artist: track
                .artists
                .into_iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(" & "),
            album: track.album.name,
            duration_ms: track.duration_ms as i32,
            artwork: track.album.images.into_iter().next().map(|i| i.url),
            isrc: track.external_ids.and_then(|ids| ids.isrc),
        }
    }
}
