use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use lyricrelay_core::{AlternativeQuery, LyricsService};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Plain-text body of `GET /api`.
pub const WELCOME_MESSAGE: &str = "Welcome to the MusixLyrics API!";

/// Build the relay router around a lyrics service.
#[must_use]
pub fn router(service: LyricsService) -> Router {
    Router::new()
        .route("/api", get(welcome))
        .route("/api/lyrics/{query}", get(lyrics))
        .route("/api/alternative", get(alternative))
        .with_state(service)
}

/// `{code, message, lyrics}` success body.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    code: u16,
    message: &'static str,
    lyrics: T,
}

impl<T: Serialize> Envelope<T> {
    const fn success(lyrics: T) -> Self {
        Self {
            code: 200,
            message: "success",
            lyrics,
        }
    }

    /// Pretty-printed JSON with a trailing newline.
    fn into_json(self) -> Result<Response, ApiError> {
        let mut body = serde_json::to_string_pretty(&self).map_err(ApiError::Encode)?;
        body.push('\n');
        Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
    }
}

async fn welcome() -> &'static str {
    WELCOME_MESSAGE
}

/// The path segment is a free-text search query, not a provider track id.
async fn lyrics(
    State(service): State<LyricsService>,
    Path(query): Path<String>,
) -> Result<Response, ApiError> {
    let lines = service.lyrics_for_query(&query).await?;
    Envelope::success(lines).into_json()
}

#[derive(Debug, Deserialize)]
struct AlternativeParams {
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    /// Seconds, forwarded as sent (fractional values included)
    duration: Option<String>,
}

impl From<AlternativeParams> for AlternativeQuery {
    fn from(params: AlternativeParams) -> Self {
        let query = Self::new(params.title, params.artist);
        match params.duration {
            Some(duration) => query.with_duration(duration),
            None => query,
        }
    }
}

async fn alternative(
    State(service): State<LyricsService>,
    Query(params): Query<AlternativeParams>,
) -> Result<Response, ApiError> {
    let lrc = service.alternative_lyrics(&params.into()).await?;
    Envelope::success(lrc).into_json()
}
