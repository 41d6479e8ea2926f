//! `stbhop` Core Library
//!
//! This crate runs commands on set-top boxes that are only reachable through
//! an SSH proxy. One run authenticates to the proxy, captures the device log
//! stream on the proxy, hops to the device over a nested interactive
//! session, answers its login prompts, runs a command sequence and cleans up
//! after itself.
//!
//! # Crate Structure
//!
//! - [`transport`] - Proxy connection (`ProxyTransport`, russh-backed `TransportSession`)
//! - [`shell`] - Interactive shell driver with quiet-period output detection
//! - [`auth`] - Device login prompt state machine
//! - [`monitor`] - Proxy-side log capture
//! - [`runner`] - Command sequence runner and stale-process cleanup
//! - [`console`] - Session-owning facade for front-ends
//! - [`config`] - Settings, command catalog and persistence
//! - [`oplog`] - Append-only operation log
//! - [`testing`] - Scripted in-memory transport

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod console;
pub mod error;
pub mod monitor;
pub mod oplog;
pub mod runner;
pub mod shell;
pub mod testing;
pub mod tracing;
pub mod transport;

// =============================================================================
// Convenience re-exports
// =============================================================================

pub use auth::{AuthPromptHandler, AuthState, PromptMatcher, PromptResponse};
pub use config::{
    AppSettings, CatalogEntry, CommandCatalog, CommandSpec, ConfigManager, render_template,
};
pub use console::{ConnectRequest, OperatorConsole};
pub use error::{ConfigError, ConfigResult, ErrorCategory, HopError, HopResult};
pub use monitor::{LogMonitor, LogMonitorHandle, MonitorSettings};
pub use oplog::{OperationLog, OperationRecord, Outcome};
pub use runner::{
    CommandSequenceRunner, ExecutionResult, RunState, RunnerSettings, is_valid_address,
    kill_stale_command, kill_stale_log_processes, parse_device_address,
};
pub use shell::{DrainSettings, ShellDriver};
pub use transport::{
    CommandOutput, InteractiveChannel, ProxyCredential, ProxyTransport, TransportSession,
    TransportSettings,
};

pub use crate::tracing::{
    TracingConfig, TracingError, TracingLevel, TracingOutput, TracingResult, init_tracing,
};
