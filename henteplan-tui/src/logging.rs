//! Tracing subscriber setup.
//!
//! The filter comes from `HENTEPLAN_LOG` when set, otherwise from
//! `logging.level`. The TUI owns the terminal, so it always logs to a file;
//! subcommands log to stderr unless a file is configured.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use henteplan_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a filter directive.
pub(crate) const LOG_ENV: &str = "HENTEPLAN_LOG";
/// Log file used by the TUI when none is configured.
pub(crate) const DEFAULT_TUI_LOG: &str = "henteplan.log";

/// Where log lines end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Resolve the target for the current mode.
pub(crate) fn log_target(config: &LoggingConfig, interactive: bool) -> LogTarget {
    match (&config.file, interactive) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::File(PathBuf::from(DEFAULT_TUI_LOG)),
        (None, false) => LogTarget::Stderr,
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must outlive every
/// log call.
pub(crate) fn init_logging(config: &LoggingConfig, interactive: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level {:?}", config.level))?;

    let (writer, guard, ansi) = match log_target(config, interactive) {
        LogTarget::Stderr => (BoxMakeWriter::new(io::stderr), None, true),
        LogTarget::File(path) => {
            let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file path {} has no file name", path.display()))?;
            let appender = rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(writer).with_ansi(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true))
            .try_init()?;
    }

    Ok(guard)
}
