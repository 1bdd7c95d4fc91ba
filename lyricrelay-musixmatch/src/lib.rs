//! Musixmatch lyrics provider using the desktop app's web API.
//!
//! The desktop API hands out anonymous user tokens and expects two fixed
//! headers on every call. Synced lyrics come back either as LRC text
//! (`track.subtitle.get`) or as a structured list from the rich
//! `macro.subtitles.get` call.

mod api;
mod token_manager;

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use lyricrelay_core::{
    render_timed_entries, AlternativeQuery, Clock, CoreError, LyricsLineMap, LyricsProvider,
    ProviderConfig, SystemClock, TrackId, UpstreamError,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use api::{Envelope, MacroBody, SearchBody, SubtitleBody, TokenBody, Track};
pub use token_manager::{NoTokenError, TokenCache, TokenRecord, DEFAULT_TOKEN_TTL};

/// Host the desktop API is served from, sent as the `authority` header.
const AUTHORITY: &str = "apic-desktop.musixmatch.com";

/// Load-balancer cookies the desktop API expects to see zeroed.
const COOKIE: &str = "AWSELBCORS=0; AWSELB=0;";

const TOKEN_PATH: &str = "message.body.user_token";
const TRACK_LIST_PATH: &str = "message.body.track_list";
const SUBTITLE_PATH: &str = "message.body.subtitle.subtitle_body";
const MACRO_SUBTITLE_PATH: &str = "message.body.macro_calls['track.subtitles.get']\
     .message.body.subtitle_list[0].subtitle.subtitle_body";

/// Pick the track whose `"{name} {artist}"` label occurs in `query`, else the
/// first track. Tracks missing either name never match by label.
fn pick_track<'a>(query: &str, tracks: &'a [Track]) -> Option<&'a Track> {
    tracks
        .iter()
        .find(|track| track.label().is_some_and(|label| query.contains(&label)))
        .or_else(|| tracks.first())
}

/// Musixmatch desktop API client.
pub struct MusixmatchProvider {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    search_page_size: u32,
    tokens: Arc<TokenCache>,
}

impl MusixmatchProvider {
    /// Create a provider using the system clock for token expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ProviderConfig) -> Result<Self, CoreError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let tokens = Arc::new(TokenCache::new(config.token_ttl(), clock));
        Self::with_token_cache(config, tokens)
    }

    /// Create a provider around an existing token cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_token_cache(
        config: &ProviderConfig,
        tokens: Arc<TokenCache>,
    ) -> Result<Self, CoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(CoreError::HttpClient)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            search_page_size: config.search_page_size,
            tokens,
        })
    }

    /// The token cache shared by every call this provider makes.
    #[must_use]
    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Build `{base_url}/{action}?app_id=...&k=v...` with encoded values.
    fn endpoint(&self, action: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}?app_id={}",
            self.base_url,
            action,
            urlencoding::encode(&self.app_id)
        );
        for (key, value) in params {
            let _ = write!(url, "&{key}={}", urlencoding::encode(value));
        }
        url
    }

    /// GET `url` with the fixed headers and decode the JSON envelope.
    async fn get<B: DeserializeOwned>(&self, url: &str) -> Result<Envelope<B>, UpstreamError> {
        let response = self
            .client
            .get(url)
            .header("authority", AUTHORITY)
            .header("cookie", COOKIE)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        debug!("Musixmatch response status: {}", status);
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let bytes = response.bytes().await.map_err(reqwest::Error::without_url)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET an authenticated endpoint, appending the current `usertoken`.
    async fn get_authed<B: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Envelope<B>, UpstreamError> {
        let token = self
            .tokens
            .ensure_valid(|| self.request_token())
            .await
            .map_err(|e| UpstreamError::Token(Box::new(e)))?;

        let url = self.endpoint(action, params);
        info!("Musixmatch GET: {}", url);
        let url = format!("{url}&usertoken={}", urlencoding::encode(&token));
        self.get(&url).await
    }

    /// One call to `token.get`, without touching the cache.
    async fn request_token(&self) -> Result<String, UpstreamError> {
        let url = self.endpoint("token.get", &[]);
        info!("Musixmatch GET: {}", url);

        let envelope: Envelope<TokenBody> = self.get(&url).await?;
        let status = envelope.status_code();
        let token = envelope
            .into_body(TOKEN_PATH)?
            .user_token
            .filter(|t| !t.is_empty());

        token.ok_or_else(|| {
            warn!("Token response had no user_token (API status {:?})", status);
            UpstreamError::MissingField(TOKEN_PATH)
        })
    }

    /// Acquire a fresh token and store it in the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenFetch`] if the request fails or the response
    /// has no token.
    pub async fn fetch_token(&self) -> Result<String, CoreError> {
        self.tokens
            .refresh(|| self.request_token())
            .await
            .map_err(CoreError::TokenFetch)
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>, UpstreamError> {
        let page_size = self.search_page_size.to_string();
        let envelope: Envelope<SearchBody> = self
            .get_authed(
                "track.search",
                &[
                    ("page_size", page_size.as_str()),
                    ("page", "1"),
                    ("s_track_rating", "desc"),
                    ("quorum_factor", "1.0"),
                    ("q", query),
                ],
            )
            .await?;

        Ok(envelope
            .into_body(TRACK_LIST_PATH)?
            .track_list
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.track)
            .collect())
    }

    async fn subtitle(&self, track_id: &TrackId) -> Result<String, UpstreamError> {
        let envelope: Envelope<SubtitleBody> = self
            .get_authed(
                "track.subtitle.get",
                &[("subtitle_format", "lrc"), ("track_id", track_id.as_str())],
            )
            .await?;

        envelope
            .into_body(SUBTITLE_PATH)?
            .subtitle
            .and_then(|s| s.subtitle_body)
            .ok_or(UpstreamError::MissingField(SUBTITLE_PATH))
    }

    async fn rich_subtitle(&self, query: &AlternativeQuery) -> Result<String, UpstreamError> {
        let mut params = vec![
            ("format", "json"),
            ("namespace", "lyrics_richsynched"),
            ("subtitle_format", "mxm"),
            ("q_album", ""),
            ("q_artist", query.artist.as_str()),
            ("q_artists", ""),
            ("track_spotify_id", ""),
            ("q_track", query.title.as_str()),
        ];
        if let Some(duration) = query.duration.as_deref() {
            params.push(("q_duration", duration));
        }

        let envelope: Envelope<MacroBody> = self.get_authed("macro.subtitles.get", &params).await?;
        let entries = envelope
            .into_body(MACRO_SUBTITLE_PATH)?
            .into_subtitle_entries(MACRO_SUBTITLE_PATH)?;

        Ok(render_timed_entries(&entries))
    }
}

#[async_trait]
impl LyricsProvider for MusixmatchProvider {
    fn name(&self) -> &'static str {
        "musixmatch"
    }

    async fn search_track(&self, query: &str) -> Result<TrackId, CoreError> {
        let tracks = self.search(query).await.map_err(CoreError::Search)?;

        let track = pick_track(query, &tracks).ok_or_else(|| CoreError::NoTrackFound {
            query: query.to_string(),
        })?;

        info!(
            "Matched track {} ({:?} - {:?}) out of {} candidates",
            track.track_id,
            track.artist_name,
            track.track_name,
            tracks.len()
        );
        Ok(track.track_id.clone())
    }

    async fn fetch_lyrics(&self, track_id: &TrackId) -> Result<LyricsLineMap, CoreError> {
        let body = self
            .subtitle(track_id)
            .await
            .map_err(CoreError::LyricsFetch)?;
        let lines = LyricsLineMap::parse(&body);
        debug!("Parsed {} lines for track {}", lines.len(), track_id);
        Ok(lines)
    }

    async fn fetch_lyrics_alternative(
        &self,
        query: &AlternativeQuery,
    ) -> Result<String, CoreError> {
        self.rich_subtitle(query)
            .await
            .map_err(CoreError::AlternativeLyricsFetch)
    }
}
