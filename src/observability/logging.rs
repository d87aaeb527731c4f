//! Structured logging.
//!
//! `RUST_LOG` takes precedence over the configured level so operators can
//! raise verbosity for a single module without editing the config file.
//! An optional log file always records this crate at debug level.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

const FILE_FILTER: &str = "relay_maintainer=debug,info";

/// Build the filter: `RUST_LOG` if set, otherwise `relay_maintainer=<level>`.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relay_maintainer={},warn", config.log_level)))
}

/// Open `path` for appending, without rotation.
pub fn file_appender(path: &Path) -> Result<RollingFileAppender, InitError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "relay.log".to_string());

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
}

/// Install the global subscriber. Call once, before anything logs.
///
/// The returned guard flushes the file writer; hold it until exit.
pub fn init_logging(config: &ObservabilityConfig) -> Option<WorkerGuard> {
    let stdout = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_filter(env_filter(config))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_filter(env_filter(config))
            .boxed()
    };

    let (file, guard, file_error) = match config.log_file.as_deref().map(file_appender) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    tracing_subscriber::registry().with(stdout).with(file).init();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "Could not open log file, logging to stdout only");
    }
    guard
}
