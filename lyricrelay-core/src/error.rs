use std::path::PathBuf;
use thiserror::Error;

const SEARCH_FAILED: &str = "Failed to search track";

/// Why a single upstream exchange failed.
///
/// Every variant keeps the original cause so it can be logged; none of this
/// detail is returned to relay clients.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    #[error("could not obtain an access token")]
    Token(#[source] Box<UpstreamError>),
}

#[derive(Debug, Error)]
pub enum CoreError {
    // Provider errors
    #[error("Failed to retrieve access token")]
    TokenFetch(#[source] UpstreamError),

    #[error("{}", SEARCH_FAILED)]
    Search(#[source] UpstreamError),

    #[error("No track found")]
    NoTrackFound { query: String },

    #[error("Failed to retrieve lyrics")]
    LyricsFetch(#[source] UpstreamError),

    #[error("Failed to retrieve alternative lyrics")]
    AlternativeLyricsFetch(#[source] UpstreamError),

    // Configuration errors
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config file already exists: {path}")]
    ConfigExists { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// The fixed message shown to relay clients.
    ///
    /// A search that matched nothing is reported the same way as any other
    /// failed search.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::NoTrackFound { .. } => SEARCH_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure of the search-then-fetch flow, as seen by the HTTP endpoint.
///
/// Displays only the generic message; the wrapped [`CoreError`] (and its
/// upstream cause) is available through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("{}", .0.public_message())]
pub struct LyricsRetrievalError(#[source] pub CoreError);

impl LyricsRetrievalError {
    /// Render the underlying error and every cause beneath it on one line, for logs.
    #[must_use]
    pub fn chain(&self) -> String {
        let mut out = self.0.to_string();
        let mut cause = std::error::Error::source(&self.0);
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_track_found_collapses_to_search_message() {
        let err = CoreError::NoTrackFound {
            query: "nothing".into(),
        };
        assert_eq!(err.to_string(), "No track found");
        assert_eq!(err.public_message(), "Failed to search track");
    }

    #[test]
    fn retrieval_error_hides_cause_but_keeps_chain() {
        let err = LyricsRetrievalError(CoreError::LyricsFetch(UpstreamError::MissingField(
            "message.body.subtitle.subtitle_body",
        )));
        assert_eq!(err.to_string(), "Failed to retrieve lyrics");
        assert_eq!(
            err.chain(),
            "Failed to retrieve lyrics: response is missing `message.body.subtitle.subtitle_body`"
        );
    }

    #[test]
    fn token_failure_is_listed_in_chain() {
        let err = LyricsRetrievalError(CoreError::Search(UpstreamError::Token(Box::new(
            UpstreamError::Status(reqwest::StatusCode::UNAUTHORIZED),
        ))));
        assert_eq!(err.to_string(), "Failed to search track");
        assert_eq!(
            err.chain(),
            "Failed to search track: could not obtain an access token: \
             upstream returned HTTP 401 Unauthorized"
        );
    }
}
