use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use lyricrelay_core::{CoreError, LyricsService, RelayConfig};
use lyricrelay_musixmatch::MusixmatchProvider;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Writes the config template instead of starting the relay.
const INIT_CONFIG_FLAG: &str = "--init-config";

fn main() -> ExitCode {
    // Usage: lyricrelay [--init-config] [CONFIG_PATH]
    let mut args = std::env::args_os().skip(1).peekable();
    let init_config = args.next_if(|arg| arg == INIT_CONFIG_FLAG).is_some();
    let config_path = args
        .next()
        .map_or_else(RelayConfig::config_path, PathBuf::from);

    if init_config {
        return match RelayConfig::write_template(&config_path) {
            Ok(()) => {
                println!("Wrote config template to {}", config_path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let config = match RelayConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.filter, config.logging.file);
    info!("Using config at {}", config_path.display());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    match runtime.block_on(serve(config, cancel_token)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: RelayConfig, cancel_token: CancellationToken) -> Result<(), CoreError> {
    let provider = MusixmatchProvider::new(&config.provider)?;
    let service = LyricsService::new(Arc::new(provider));
    let app = lyricrelay_server::router(service);

    let addr = config.server.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Lyrics relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await?;

    info!("Lyrics relay stopped");
    Ok(())
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(default_filter: &str, file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer();

    if file_logging_enabled {
        let log_path = lyricrelay_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
