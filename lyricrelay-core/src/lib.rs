pub mod config;
pub mod error;
pub mod lrc;
pub mod paths;
pub mod provider;
pub mod service;
pub mod time;

pub use config::{
    LoggingConfig, ProviderConfig, RelayConfig, ServerConfig, DEFAULT_APP_ID,
    DEFAULT_PROVIDER_BASE_URL,
};
pub use error::{CoreError, LyricsRetrievalError, UpstreamError};
pub use lrc::{render_timed_entries, EntryTime, LyricsLineMap, TimedEntry, INSTRUMENTAL_MARKER};
pub use paths::{config_dir, config_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use provider::{AlternativeQuery, LyricsProvider, TrackId};
pub use service::LyricsService;
pub use time::{Clock, DurationExt, ManualClock, SystemClock};
