//! Access token cache for the Musixmatch desktop API.
//!
//! The API hands out anonymous user tokens that are reused for a fixed window
//! after acquisition. One token is shared by every request the process serves:
//! 1. Load the cached record (absent counts as expired)
//! 2. If it is expired, refresh once under a lock
//! 3. Store the new token with `expires_at = now + ttl`

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lyricrelay_core::{Clock, DurationExt, UpstreamError};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Default time a freshly acquired token is trusted (10 minutes)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(600);

/// A cached access token with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// The opaque `usertoken` value
    pub value: String,
    /// Expiry in milliseconds since the Unix epoch
    pub expires_at_ms: u64,
}

impl TokenRecord {
    /// A token is expired once the clock reaches its expiry instant.
    #[must_use]
    pub const fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Returned by [`TokenCache::load`] before any token has been saved.
#[derive(Debug, Error)]
#[error("no access token has been saved yet")]
pub struct NoTokenError;

/// Process-wide single-slot token cache.
///
/// Refreshes are serialized: callers that find the token expired queue on a
/// mutex and re-check the slot after acquiring it, so a burst of requests
/// causes one upstream token call.
pub struct TokenCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<TokenRecord>>,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Store `token`, replacing any previous record.
    pub async fn save(&self, token: impl Into<String>) -> TokenRecord {
        let record = TokenRecord {
            value: token.into(),
            expires_at_ms: self.clock.now_ms().saturating_add(self.ttl.as_millis_u64()),
        };
        *self.slot.write().await = Some(record.clone());
        debug!("Cached access token until {} ms", record.expires_at_ms);
        record
    }

    /// Current record, expired or not.
    ///
    /// # Errors
    ///
    /// Returns [`NoTokenError`] if nothing has been saved yet.
    pub async fn load(&self) -> Result<TokenRecord, NoTokenError> {
        self.slot.read().await.clone().ok_or(NoTokenError)
    }

    /// Current token value if it has not expired.
    async fn valid_token(&self) -> Option<String> {
        let now_ms = self.clock.now_ms();
        match self.load().await {
            Ok(record) if !record.is_expired(now_ms) => Some(record.value),
            Ok(record) => {
                debug!(
                    "Cached access token expired at {} ms (now {} ms)",
                    record.expires_at_ms, now_ms
                );
                None
            }
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }

    /// Return a valid token, calling `refresh` if the cached one is missing
    /// or expired.
    ///
    /// # Errors
    ///
    /// Propagates the error from `refresh`; the cache is left untouched.
    pub async fn ensure_valid<F, Fut>(&self, refresh: F) -> Result<String, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, UpstreamError>>,
    {
        // Fast path: check if we have a valid cached token
        if let Some(token) = self.valid_token().await {
            debug!("Using cached access token");
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.valid_token().await {
            debug!("Access token was refreshed by a concurrent request");
            return Ok(token);
        }

        self.refresh_locked(refresh).await
    }

    /// Unconditionally fetch a new token through `refresh` and cache it.
    ///
    /// # Errors
    ///
    /// Propagates the error from `refresh`.
    pub async fn refresh<F, Fut>(&self, refresh: F) -> Result<String, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, UpstreamError>>,
    {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked(refresh).await
    }

    async fn refresh_locked<F, Fut>(&self, refresh: F) -> Result<String, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, UpstreamError>>,
    {
        info!("Refreshing Musixmatch access token");
        let token = refresh().await?;
        let record = self.save(token).await;
        info!("Obtained Musixmatch access token");
        Ok(record.value)
    }
}
