//! Tracing integration for structured logging
//!
//! Installs the `fmt` subscriber used by every `stbhop` front-end and names
//! the spans the engine emits, so log output for a run (proxy connect, log
//! monitor, device login, cleanup) can be filtered consistently.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Errors from [`init_tracing`]
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber is already installed
    #[error("Tracing has already been initialized")]
    AlreadyInitialized,

    /// The log file could not be opened for appending
    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        /// Requested log file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for tracing setup
pub type TracingResult<T> = Result<T, TracingError>;

/// Verbosity of `stbhop` and engine targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TracingLevel {
    /// Failures only
    Error,
    /// Failures and swallowed cleanup problems
    #[default]
    Warn,
    /// Run lifecycle steps
    Info,
    /// State transitions and channel traffic sizes
    Debug,
    /// Everything
    Trace,
}

impl TracingLevel {
    /// Maps a `-v` count to a level (0 = warn)
    #[must_use]
    pub const fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Warn,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Directive name understood by `EnvFilter`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Filter for our crates at this level; russh stays at warn
    #[must_use]
    pub fn directives(self) -> String {
        let level = self.as_str();
        format!("stbhop_core={level},stbhop={level},russh=warn")
    }
}

impl std::str::FromStr for TracingLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Error, Self::Warn, Self::Info, Self::Debug, Self::Trace]
            .into_iter()
            .find(|level| s.eq_ignore_ascii_case(level.as_str()))
            .or_else(|| s.eq_ignore_ascii_case("warning").then_some(Self::Warn))
            .ok_or(())
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Standard output
    Stdout,
    /// Standard error, keeping stdout for command results
    #[default]
    Stderr,
    /// Appended to a file, without ANSI colours
    File {
        /// Path to the log file
        path: PathBuf,
    },
}

/// Subscriber settings
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Level for `stbhop` targets; `RUST_LOG` overrides it
    pub level: TracingLevel,
    /// Destination
    pub output: TracingOutput,
}

impl TracingConfig {
    /// Warn level on stderr
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.directives()))
    }

    fn writer(&self) -> TracingResult<(BoxMakeWriter, bool)> {
        Ok(match &self.output {
            TracingOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
            TracingOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
            TracingOutput::File { path } => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| TracingError::LogFile {
                        path: path.clone(),
                        source,
                    })?;
                (BoxMakeWriter::new(Mutex::new(file)), false)
            }
        })
    }
}

/// Installs the global subscriber; only the first call succeeds
///
/// # Errors
///
/// Returns `TracingError::LogFile` if the log file cannot be opened and
/// `TracingError::AlreadyInitialized` on a second call.
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    let (writer, ansi) = config.writer()?;
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)?;

    tracing::debug!(level = %config.level, "Tracing initialized");
    Ok(())
}

/// Standard span names for `stbhop` operations
pub mod span_names {
    /// Proxy connection establishment
    pub const PROXY_CONNECT: &str = "proxy.connect";
    /// Proxy disconnect
    pub const PROXY_DISCONNECT: &str = "proxy.disconnect";
    /// Non-interactive proxy command
    pub const PROXY_EXEC: &str = "proxy.exec";
    /// Whole command sequence run
    pub const RUN_EXECUTE: &str = "run.execute";
    /// Device login prompt handling
    pub const RUN_AUTHENTICATE: &str = "run.authenticate";
    /// Log monitor start
    pub const MONITOR_START: &str = "monitor.start";
    /// Background log capture task
    pub const MONITOR_CAPTURE: &str = "monitor.capture";
    /// Log monitor stop and collection
    pub const MONITOR_STOP: &str = "monitor.stop";
    /// Stale log process cleanup on the proxy
    pub const CLEANUP_KILL_STALE: &str = "cleanup.kill_stale";
    /// Configuration load
    pub const CONFIG_LOAD: &str = "config.load";
}
