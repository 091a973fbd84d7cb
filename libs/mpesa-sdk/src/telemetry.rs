//! Process-wide logging setup for binaries embedding the client.
//!
//! Library code only emits `tracing` events; nothing in this crate installs a
//! subscriber unless [`init_logging`] is called.

use std::path::PathBuf;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::MpesaError;

pub const LOG_FILE_NAME: &str = "mpesa.log";
const MAX_LOG_FILE_BYTES: usize = 10 * 1024 * 1024;
const MAX_LOG_BACKUPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Mirror events to stdout.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_owned(),
            console: true,
        }
    }
}

/// Flushes buffered log lines when dropped. Keep it alive for the lifetime
/// of the process.
#[must_use = "dropping the guard stops the log writer"]
pub struct LoggingGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber: a rotating file in `log_dir` plus an
/// optional console layer.
///
/// # Errors
/// Returns [`MpesaError::Configuration`] when the log directory cannot be
/// created, the filter directive is invalid, or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, MpesaError> {
    std::fs::create_dir_all(&config.log_dir).map_err(|e| {
        MpesaError::Configuration(format!(
            "cannot create log directory '{}': {e}",
            config.log_dir.display()
        ))
    })?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| MpesaError::Configuration(format!("invalid log level: {e}")))?;

    let rotating = FileRotate::new(
        config.log_dir.join(LOG_FILE_NAME),
        AppendCount::new(MAX_LOG_BACKUPS),
        ContentLimit::Bytes(MAX_LOG_FILE_BYTES),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let (file_writer, file_guard) = tracing_appender::non_blocking(rotating);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_writer);

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| MpesaError::Configuration(format!("logging already initialized: {e}")))?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        console = config.console,
        "logging initialized"
    );

    Ok(LoggingGuard { _file: file_guard })
}
