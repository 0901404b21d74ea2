//! Subscriber setup for the command-line binary.
//!
//! The library only emits `tracing` events; the binary builds a
//! [`LogContext`] from its flags and installs it exactly once.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Warnings and errors only.
    Quiet,
    /// Stage progress.
    Normal,
    /// Per-peak decisions.
    Verbose,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// Level from `-v` count and `--quiet`.
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => LogLevel::Quiet,
            (false, 0) => LogLevel::Normal,
            (false, 1) => LogLevel::Verbose,
            (false, _) => LogLevel::Trace,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Quiet => "warn",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logging failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be created.
    #[error("cannot create log file {path}: {source}")]
    LogFile {
        /// Requested path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("logging already initialised: {0}")]
    AlreadyInstalled(String),
}

/// Explicit logging configuration handed from the binary to [`LogContext::install`].
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Default verbosity; `RUST_LOG` overrides it.
    pub level: LogLevel,
    /// Write to this file instead of standard error.
    pub log_file: Option<PathBuf>,
}

impl LogContext {
    /// Context with the given level, logging to standard error.
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            log_file: None,
        }
    }

    /// Filter built from `RUST_LOG`, falling back to the configured level.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.directive()))
    }

    /// Install the global subscriber.
    pub fn install(&self) -> Result<(), LoggingError> {
        let builder = tracing_subscriber::fmt().with_env_filter(self.filter());
        let result = match &self.log_file {
            Some(path) => {
                let file = File::create(path).map_err(|source| LoggingError::LogFile {
                    path: path.clone(),
                    source,
                })?;
                builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
            }
            None => builder.with_writer(std::io::stderr).try_init(),
        };
        result.map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))
    }
}
