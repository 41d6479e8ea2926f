//! Error types for `stbhop`
//!
//! Every failure the engine can surface to a caller is a [`HopError`].
//! Variants map one-to-one onto the failure classes an operator needs to
//! tell apart: the proxy could not be reached, the proxy rejected the key,
//! the device address was malformed, the device never finished its login
//! prompts, a proxy command hung, or log capture could not be started.

use std::path::PathBuf;

use thiserror::Error;

/// Broad grouping of errors, used for user-facing labels and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network or host failures, lost sessions
    Connection,
    /// Rejected credentials or unresolved login prompts
    Authentication,
    /// Malformed input such as an invalid device address
    Validation,
    /// Command dispatch, channel or timeout failures
    Command,
    /// Settings or catalog problems
    Configuration,
}

impl ErrorCategory {
    /// Human readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connection => "Connection",
            Self::Authentication => "Authentication",
            Self::Validation => "Validation",
            Self::Command => "Command",
            Self::Configuration => "Configuration",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by the orchestration engine
#[derive(Debug, Error)]
pub enum HopError {
    /// Proxy unreachable, handshake failed, or session not connected
    #[error("Connection to {host} failed: {reason}")]
    Connect {
        /// Proxy host
        host: String,
        /// Underlying reason
        reason: String,
    },

    /// The proxy rejected the private key, or the key could not be loaded
    #[error("Authentication as {user}@{host} failed: {reason}")]
    Authentication {
        /// Proxy user
        user: String,
        /// Proxy host
        host: String,
        /// Underlying reason
        reason: String,
    },

    /// Device address is not a dotted-quad IPv4 address
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// Device login prompts were not resolved before the deadline
    #[error("Device {address} did not complete login within {seconds}s")]
    AuthenticationTimeout {
        /// Device address
        address: String,
        /// Deadline that elapsed
        seconds: u64,
    },

    /// A non-interactive proxy command did not finish in time
    #[error("Command '{command}' did not complete within {seconds}s")]
    CommandTimeout {
        /// Command text
        command: String,
        /// Deadline that elapsed
        seconds: u64,
    },

    /// The proxy-side log capture could not be started
    #[error("Failed to start log monitor for {address}: {reason}")]
    LogMonitorStart {
        /// Device address
        address: String,
        /// Underlying reason
        reason: String,
    },

    /// I/O failure on an open channel
    #[error("Channel error: {0}")]
    Channel(String),

    /// The whole run exceeded its hard deadline
    #[error("Operation against {address} exceeded {seconds}s")]
    OperationTimeout {
        /// Device address
        address: String,
        /// Deadline that elapsed
        seconds: u64,
    },

    /// Selection key is not present in the command catalog
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Settings problem
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HopError {
    /// Creates a connection error for `host`
    pub fn connect(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connect {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Creates the error returned when a session is used while disconnected
    pub fn not_connected(host: impl Into<String>) -> Self {
        Self::connect(host, "not connected")
    }

    /// Returns the category of this error
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Connect { .. } => ErrorCategory::Connection,
            Self::Authentication { .. } | Self::AuthenticationTimeout { .. } => {
                ErrorCategory::Authentication
            }
            Self::InvalidAddress(_) => ErrorCategory::Validation,
            Self::CommandTimeout { .. }
            | Self::LogMonitorStart { .. }
            | Self::Channel(_)
            | Self::OperationTimeout { .. }
            | Self::UnknownCommand(_) => ErrorCategory::Command,
            Self::Config(_) => ErrorCategory::Configuration,
        }
    }

    /// Message shown to an operator, prefixed with the category
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("{} error: {self}", self.category())
    }
}

/// Result type alias for engine operations
pub type HopResult<T> = std::result::Result<T, HopError>;

/// Errors related to settings persistence and the command catalog
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a settings file
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Failed to serialize settings
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    /// Catalog entry is unusable
    #[error("Invalid catalog entry '{key}': {reason}")]
    InvalidEntry {
        /// Selection key
        key: String,
        /// What is wrong with it
        reason: String,
    },

    /// A prompt pattern failed to compile
    #[error("Failed to compile pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern that failed to compile
        pattern: String,
        /// The reason for the failure
        reason: String,
    },

    /// No configuration directory could be determined
    #[error("Configuration directory not found")]
    NotFound,

    /// Filesystem failure
    #[error("Failed to access {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
