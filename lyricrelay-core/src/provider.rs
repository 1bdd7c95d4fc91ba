use crate::error::CoreError;
use crate::lrc::LyricsLineMap;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Provider-assigned track identifier.
///
/// The provider sends numeric ids, but they are only ever echoed back, so
/// any string or number is accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for TrackId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self(n.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}

/// Query for the alternative (rich subtitle) lyrics lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternativeQuery {
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Track duration in seconds (narrows the match), passed upstream as given
    pub duration: Option<String>,
}

impl AlternativeQuery {
    /// Create a new alternative lyrics query
    #[must_use]
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            duration: None,
        }
    }

    /// Set duration; an empty value is treated as absent
    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        let duration = duration.into();
        self.duration = (!duration.is_empty()).then_some(duration);
        self
    }
}

/// Trait for lyrics providers
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Find the track that best matches a free-text query.
    async fn search_track(&self, query: &str) -> Result<TrackId, CoreError>;

    /// Fetch time-synced lyrics for a track as a line map.
    async fn fetch_lyrics(&self, track_id: &TrackId) -> Result<LyricsLineMap, CoreError>;

    /// Fetch rich-format lyrics by title and artist, rendered as LRC text.
    async fn fetch_lyrics_alternative(&self, query: &AlternativeQuery)
        -> Result<String, CoreError>;
}
