//! Lyrics service that turns a free-text query into a lyrics line map.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{CoreError, LyricsRetrievalError};
use crate::lrc::LyricsLineMap;
use crate::provider::{AlternativeQuery, LyricsProvider};

/// Runs search then fetch against a single provider, one call at a time.
#[derive(Clone)]
pub struct LyricsService {
    provider: Arc<dyn LyricsProvider>,
}

impl LyricsService {
    #[must_use]
    pub fn new(provider: Arc<dyn LyricsProvider>) -> Self {
        Self { provider }
    }

    /// Search for `query` and fetch the lyrics of the chosen track.
    ///
    /// # Errors
    ///
    /// Returns [`LyricsRetrievalError`] if either step fails. Its message is
    /// generic; the cause is logged here.
    pub async fn lyrics_for_query(&self, query: &str) -> Result<LyricsLineMap, LyricsRetrievalError> {
        info!(
            "Looking up lyrics for query {:?} via {}",
            query,
            self.provider.name()
        );

        match self.search_and_fetch(query).await {
            Ok(lines) => {
                info!("Found {} lyric lines for query {:?}", lines.len(), query);
                Ok(lines)
            }
            Err(e) => {
                let err = LyricsRetrievalError(e);
                warn!("Lyrics lookup for {:?} failed: {}", query, err.chain());
                Err(err)
            }
        }
    }

    async fn search_and_fetch(&self, query: &str) -> Result<LyricsLineMap, CoreError> {
        let track_id = self.provider.search_track(query).await?;
        info!("Query {:?} resolved to track {}", query, track_id);
        self.provider.fetch_lyrics(&track_id).await
    }

    /// Fetch rich-format lyrics by title and artist, rendered as LRC text.
    ///
    /// # Errors
    ///
    /// Returns [`LyricsRetrievalError`] if the lookup fails.
    pub async fn alternative_lyrics(
        &self,
        query: &AlternativeQuery,
    ) -> Result<String, LyricsRetrievalError> {
        info!(
            "Looking up alternative lyrics for: {} - {} (duration: {:?})",
            query.artist, query.title, query.duration
        );

        self.provider
            .fetch_lyrics_alternative(query)
            .await
            .map_err(|e| {
                let err = LyricsRetrievalError(e);
                warn!(
                    "Alternative lyrics lookup for {} - {} failed: {}",
                    query.artist,
                    query.title,
                    err.chain()
                );
                err
            })
    }
}
