//! Tracing subscriber setup.

use std::path::Path;

use lighty_core::config::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILE: &str = "logs/lighty.log";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log level `{level}`: {source}")]
    Filter {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|source| LoggingError::Filter {
        level: settings.level.clone(),
        source,
    })
}

/// Split a log file path into the directory and file-name prefix used by the
/// daily rolling appender.
pub fn file_target(path: &str) -> (&Path, &str) {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("lighty.log");
    (dir, prefix)
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should keep flushing.
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = env_filter(settings)?;

    let (file_layer, guard) = if settings.file_enabled {
        let path = settings.file_path.as_deref().unwrap_or(DEFAULT_LOG_FILE);
        let (dir, prefix) = file_target(path);
        let appender = tracing_appender::rolling::daily(dir, prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
