//! Logging setup and the per-component logger handle.
//!
//! [`init`] installs the subscriber once, from the binary. Components never
//! touch the global subscriber: they receive a [`Logger`] at construction and
//! emit every event tagged with their component name.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::runtime::{Runtime, ensure_parent};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Optional file receiving a copy of every event, without ANSI colors.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self { level, file: None }
    }

    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }
}

/// Installs the global subscriber: stderr output plus an optional log file.
///
/// Fails if a subscriber is already installed or the log file cannot be opened.
pub fn init<R: Runtime>(runtime: &R, config: &LogConfig) -> Result<()> {
    let file_layer = match &config.file {
        Some(path) => Some(
            tracing_fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(runtime, path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(())
}

/// Opens `path` for appending, creating its directory first.
fn open_log_file<R: Runtime>(runtime: &R, path: &Path) -> Result<File> {
    ensure_parent(runtime, path)
        .and_then(|()| runtime.open_append(path))
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Logger handle injected into a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Logger {
    component: Arc<str>,
}

impl Logger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: Arc::from(component.into()),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(component = %self.component, "{message}");
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(component = %self.component, "{message}");
    }

    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(component = %self.component, "{message}");
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(component = %self.component, "{message}");
    }
}

/// Runs `f` under a thread-local subscriber and returns everything it logged.
#[cfg(test)]
pub(crate) fn capture<F: FnOnce()>(f: F) -> String {
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
