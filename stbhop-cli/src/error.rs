//! CLI error types and exit codes.

use stbhop_core::{ConfigError, ErrorCategory, HopError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other local errors
    pub const GENERAL_ERROR: i32 = 1;
    /// The proxy or the device could not be reached or refused the login
    pub const CONNECTION_FAILURE: i32 = 2;
    /// A command failed or ran out of time
    pub const COMMAND_FAILURE: i32 = 3;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Proxy or device connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Rejected credentials or unanswered login prompts
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Command dispatch or timeout failure
    #[error("Command error: {0}")]
    Command(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HopError> for CliError {
    fn from(err: HopError) -> Self {
        let message = err.to_string();
        match err.category() {
            ErrorCategory::Connection => Self::Connection(message),
            ErrorCategory::Authentication => Self::Authentication(message),
            ErrorCategory::Validation => Self::Validation(message),
            ErrorCategory::Command => Self::Command(message),
            ErrorCategory::Configuration => Self::Config(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, validation, IO)
    /// - 2: Connection or authentication failure
    /// - 3: Command or timeout failure
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) | Self::Authentication(_) => exit_codes::CONNECTION_FAILURE,
            Self::Command(_) => exit_codes::COMMAND_FAILURE,
            Self::Config(_) | Self::Validation(_) | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
