use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lyricrelay_core::LyricsRetrievalError;
use thiserror::Error;

/// Errors returned to relay clients.
///
/// Every variant answers 500 with a single-line plain-text body; the cause
/// chain stays in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Retrieval(#[from] LyricsRetrievalError),

    #[error("Failed to encode response")]
    Encode(#[source] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
