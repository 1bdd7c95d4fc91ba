//! Response shapes of the Musixmatch desktop web API.
//!
//! Every response is wrapped as `{"message": {"header": ..., "body": ...}}`.
//! The API answers "nothing here" with `"body": []` or `"body": ""` instead of
//! an object, so bodies are decoded leniently and a body of the wrong shape is
//! treated as absent.

use std::collections::HashMap;

use lyricrelay_core::{TimedEntry, TrackId, UpstreamError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "B: DeserializeOwned"))]
pub struct Envelope<B> {
    pub message: Message<B>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "B: DeserializeOwned"))]
pub struct Message<B> {
    #[serde(default)]
    pub header: Option<Header>,
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<B>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl<B> Envelope<B> {
    /// Status code the API reports inside the body (distinct from HTTP status).
    pub fn status_code(&self) -> Option<u16> {
        self.message.header.and_then(|h| h.status_code)
    }

    /// Take the body, failing with `path` if it is absent.
    pub fn into_body(self, path: &'static str) -> Result<B, UpstreamError> {
        self.message.body.ok_or(UpstreamError::MissingField(path))
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    // Bodies are always objects; `[]` and `""` stand for "no body".
    match serde_json::Value::deserialize(deserializer)? {
        value @ serde_json::Value::Object(_) => Ok(serde_json::from_value(value).ok()),
        _ => Ok(None),
    }
}

// token.get

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub user_token: Option<String>,
}

// track.search

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub track_list: Option<Vec<TrackListItem>>,
}

#[derive(Debug, Deserialize)]
pub struct TrackListItem {
    pub track: Track,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub track_id: TrackId,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
}

impl Track {
    /// `"{track_name} {artist_name}"`, the label matched against queries.
    ///
    /// `None` unless both names are present.
    pub fn label(&self) -> Option<String> {
        let name = self.track_name.as_deref()?;
        let artist = self.artist_name.as_deref()?;
        Some(format!("{name} {artist}"))
    }
}

// track.subtitle.get

#[derive(Debug, Deserialize)]
pub struct SubtitleBody {
    #[serde(default)]
    pub subtitle: Option<Subtitle>,
}

#[derive(Debug, Deserialize)]
pub struct Subtitle {
    #[serde(default)]
    pub subtitle_body: Option<String>,
}

// macro.subtitles.get

pub const SUBTITLES_MACRO: &str = "track.subtitles.get";

#[derive(Debug, Deserialize)]
pub struct MacroBody {
    #[serde(default)]
    pub macro_calls: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SubtitleListBody {
    #[serde(default)]
    pub subtitle_list: Vec<RichSubtitleItem>,
}

#[derive(Debug, Deserialize)]
pub struct RichSubtitleItem {
    #[serde(default)]
    pub subtitle: Option<RichSubtitle>,
}

#[derive(Debug, Deserialize)]
pub struct RichSubtitle {
    #[serde(default)]
    pub subtitle_body: Option<RichSubtitleBody>,
}

/// The rich subtitle list, either inline or as a JSON-encoded string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RichSubtitleBody {
    Entries(Vec<TimedEntry>),
    Encoded(String),
}

impl RichSubtitleBody {
    pub fn into_entries(self) -> Result<Vec<TimedEntry>, UpstreamError> {
        match self {
            Self::Entries(entries) => Ok(entries),
            Self::Encoded(raw) => Ok(serde_json::from_str(&raw)?),
        }
    }
}

impl MacroBody {
    /// Dig the rich subtitle list out of the `track.subtitles.get` macro call.
    pub fn into_subtitle_entries(
        mut self,
        path: &'static str,
    ) -> Result<Vec<TimedEntry>, UpstreamError> {
        let call = self
            .macro_calls
            .remove(SUBTITLES_MACRO)
            .ok_or(UpstreamError::MissingField(path))?;
        let envelope: Envelope<SubtitleListBody> = serde_json::from_value(call)?;

        envelope
            .into_body(path)?
            .subtitle_list
            .into_iter()
            .next()
            .and_then(|item| item.subtitle)
            .and_then(|subtitle| subtitle.subtitle_body)
            .ok_or(UpstreamError::MissingField(path))?
            .into_entries()
    }
}
