//! Tracing setup: stdout always, plus an optional daily-rolling file.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::parse_bool;

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_DIR: &str = "./logs";
const LOG_FILE_PREFIX: &str = "prepcoach.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    /// Directory for the rolling file; `None` keeps logs on stdout only
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    /// `RUST_LOG`, `ENABLE_FILE_LOGS` and `LOG_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let file_logs = value("ENABLE_FILE_LOGS")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);
        Self {
            filter: value("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            file_dir: file_logs.then(|| {
                PathBuf::from(value("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()))
            }),
        }
    }
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer and must live as long as the process logs.
pub fn init_tracing(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let mut file_error = None;
    let (file_layer, guard) = match settings.file_dir.as_deref() {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_writer(writer).with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(err) => {
                file_error = Some((dir.display().to_string(), err));
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    if let Some((dir, err)) = file_error {
        tracing::warn!(%dir, error = %err, "file logging disabled");
    }
    guard
}
