// Subscriber setup for the birthday run.
//
// Locally we log to stdout and append to `birthday_bot.log`. Inside a cloud
// function (`FUNCTION_TARGET` is set by the runtime) only stdout is used and
// timestamps are dropped, since the platform stamps every line itself.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, Layer, Registry};

pub const LOG_FILE_NAME: &str = "birthday_bot.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Could not open log file: {0}")]
    File(#[from] InitError),

    #[error("A global subscriber is already installed: {0}")]
    Init(#[from] TryInitError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// Running inside a cloud function.
    pub cloud: bool,
    pub file: Option<PathBuf>,
    /// A `LOG_LEVEL` value we could not understand, reported once logging is up.
    pub unrecognized_level: Option<String>,
}

impl LogSettings {
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cloud = get("FUNCTION_TARGET").is_some_and(|v| !v.trim().is_empty());

        let (level, unrecognized_level) = match get("LOG_LEVEL") {
            Some(raw) if !raw.trim().is_empty() => match parse_level(&raw) {
                Some(level) => (level, None),
                None => (LevelFilter::INFO, Some(raw)),
            },
            _ => (LevelFilter::INFO, None),
        };

        Self {
            level,
            cloud,
            file: (!cloud).then(|| PathBuf::from(LOG_FILE_NAME)),
            unrecognized_level,
        }
    }
}

/// Accepts tracing's level names plus the `WARNING`/`CRITICAL` spellings
/// people bring over from other logging setups.
fn parse_level(raw: &str) -> Option<LevelFilter> {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "warning" => Some(LevelFilter::WARN),
        "critical" | "fatal" => Some(LevelFilter::ERROR),
        _ => raw.parse().ok(),
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, InitError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| LOG_FILE_NAME.to_string());

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
}

/// Installs the global subscriber. Keep the returned guard alive until the
/// run ends or buffered file output is lost.
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>, LoggingError> {
    let stdout_layer: Box<dyn Layer<Registry> + Send + Sync> = if settings.cloud {
        Box::new(fmt::layer().with_target(false).without_time())
    } else {
        Box::new(fmt::layer().with_target(false))
    };

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(settings.level)
        .try_init()?;

    if let Some(raw) = &settings.unrecognized_level {
        tracing::warn!("Unrecognized LOG_LEVEL {:?}, using info", raw);
    }

    Ok(guard)
}
