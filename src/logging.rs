//! Diagnostic logging for the generator
//!
//! stdout carries the link and the JSON summary, so every diagnostic goes to
//! stderr. A copy can also be kept in a file, optionally rotated. The link log
//! written with `--redirect` is separate and lives in [`crate::output`].

use crate::config::{LogRotation, LoggingOptions};
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

// Flushes the file sink when the process exits
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type Filtered = Layered<EnvFilter, Registry>;
type Sink = Box<dyn Layer<Filtered> + Send + Sync + 'static>;

/// Install the global subscriber. A second call is a no-op.
pub fn init(options: &LoggingOptions) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let mut sinks: Vec<Sink> = vec![stderr_sink(options.color)];
    if let Some(path) = options.file.as_deref() {
        sinks.push(file_sink(path, options.rotation)?);
    }

    Registry::default()
        .with(level_filter(&options.level)?)
        .with(sinks)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))
}

fn stderr_sink(color: bool) -> Sink {
    fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr)
        .with_ansi(color)
        .with_target(false)
        .boxed()
}

fn file_sink(path: &Path, rotation: Option<LogRotation>) -> Result<Sink> {
    let (writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(open_log(path, rotation)?);
    let _ = FILE_GUARD.set(guard);

    Ok(fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .boxed())
}

/// Directory holding `path`; a bare file name lives in the working directory.
fn log_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn open_log(path: &Path, rotation: Option<LogRotation>) -> Result<Box<dyn Write + Send>> {
    let dir = log_dir(path);
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!("Failed to create log directory {}: {e}", dir.display()))
    })?;

    let Some(rotation) = rotation else {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| Error::Config(format!("Failed to open log file {}: {e}", path.display())))?;
        return Ok(Box::new(file));
    };

    // Rolled files are named `<prefix>.<date>` next to the configured path
    let prefix = path.file_name().ok_or_else(|| {
        Error::Config(format!(
            "Log file path '{}' needs a file name when rotation is enabled",
            path.display()
        ))
    })?;
    Ok(match rotation {
        LogRotation::Hourly => Box::new(rolling::hourly(dir, prefix)),
        LogRotation::Daily => Box::new(rolling::daily(dir, prefix)),
    })
}
