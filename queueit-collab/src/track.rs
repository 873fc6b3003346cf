use std::fmt::{self, Display};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref SPOTIFY_URI_REGEX: Regex =
        Regex::new(r"^spotify:track:([0-9A-Za-z]{22})$").expect("regex compiles");
}

/// Where a track reference points to. The queue store and vote ledger are
/// indifferent to the source, so this is a plain tag rather than separate
/// track types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackSource {
    #[default]
    Spotify,
    /// A track from a first-party library rather than an external catalog
    Local,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::Local => "local",
        }
    }
}

impl Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spotify" => Ok(Self::Spotify),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown track source: {}", other)),
        }
    }
}

/// An immutable external track reference with its cached metadata
#[derive(Debug, Clone)]
pub struct TrackData {
    /// The identifier of the track in its source catalog
    pub external_id: String,
    pub source: TrackSource,
    pub title: String,
    /// Primary artist names as an `&` separated list
    pub artist: String,
    pub album: String,
    pub duration_ms: i32,
    pub artwork: Option<String>,
    pub isrc: Option<String>,
}

/// Metadata for a track about to be upserted into the catalog cache
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub external_id: String,
    pub source: TrackSource,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: i32,
    pub artwork: Option<String>,
    pub isrc: Option<String>,
}

/// Extracts an external track id from user-supplied input.
/// Accepts a bare id, a `spotify:track:` URI, or an `open.spotify.com` link.
pub fn parse_track_reference(input: &str) -> Option<(TrackSource, String)> {
    if let Some(captures) = SPOTIFY_URI_REGEX.captures(input) {
        return Some((TrackSource::Spotify, captures[1].to_string()));
    }

    if let Ok(url) = Url::parse(input) {
        if url.host_str() == Some("open.spotify.com") {
            let mut segments = url.path_segments()?;

            if segments.next() == Some("track") {
                let id = segments.next()?;
                return Some((TrackSource::Spotify, id.to_string()));
            }
        }

        return None;
    }

    if input.len() == 22 && input.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some((TrackSource::Spotify, input.to_string()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spotify_references() {
        let id = "3n3Ppam7vgaVa1iaRUc9Lp";

        assert_eq!(
            parse_track_reference(&format!("spotify:track:{}", id)),
            Some((TrackSource::Spotify, id.to_string()))
        );

        assert_eq!(
            parse_track_reference(&format!("https://open.spotify.com/track/{}", id)),
            Some((TrackSource::Spotify, id.to_string()))
        );

        assert_eq!(
            parse_track_reference(id),
            Some((TrackSource::Spotify, id.to_string()))
        );
    }

    #[test]
    fn rejects_unknown_references() {
        assert_eq!(parse_track_reference("https://example.com/track/abc"), None);
        assert_eq!(parse_track_reference("spotify:album:xyz"), None);
        assert_eq!(parse_track_reference("not a track"), None);
    }
}
