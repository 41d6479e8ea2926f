//! Transport layer
//!
//! A [`ProxyTransport`] is one authenticated connection to the proxy host.
//! It runs request/response commands and hands out [`InteractiveChannel`]s,
//! several of which may be open at once over the same connection.
//!
//! The engine only talks to these traits; [`TransportSession`] is the
//! russh-backed implementation and [`crate::testing::ScriptedTransport`]
//! an in-memory one.

mod ssh;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::HopResult;

pub use ssh::{ProxyCredential, TransportSession, TransportSettings};

/// Default timeout for establishing the proxy connection (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default timeout for a non-interactive proxy command (seconds)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Captured result of a non-interactive command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
    /// Exit status reported by the remote side, if any
    pub exit_status: Option<u32>,
}

/// One authenticated connection to the proxy host
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Proxy host name, used in diagnostics
    fn host(&self) -> &str;

    /// Returns true while the connection is usable
    fn is_connected(&self) -> bool;

    /// Runs `command` to completion and captures its output
    ///
    /// # Errors
    ///
    /// Returns `HopError::Connect` when not connected and
    /// `HopError::CommandTimeout` when the command outlives its timeout.
    async fn run_command(&self, command: &str, want_pty: bool) -> HopResult<CommandOutput>;

    /// Opens a pseudo-terminal channel running a login shell
    ///
    /// # Errors
    ///
    /// Returns `HopError::Connect` when not connected.
    async fn open_interactive_channel(&self) -> HopResult<Box<dyn InteractiveChannel>>;

    /// Opens a pseudo-terminal channel running `command` instead of a shell
    ///
    /// Returns as soon as the command is launched; its output is read
    /// through the returned channel.
    ///
    /// # Errors
    ///
    /// Returns `HopError::Connect` when not connected.
    async fn open_command_channel(&self, command: &str) -> HopResult<Box<dyn InteractiveChannel>>;

    /// Closes the connection; a no-op when already disconnected
    async fn disconnect(&mut self);
}

/// A full-duplex pseudo-terminal channel
#[async_trait]
pub trait InteractiveChannel: Send {
    /// Writes raw bytes to the remote side
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` if the channel is closed or the write fails.
    async fn write(&mut self, data: &[u8]) -> HopResult<()>;

    /// Waits up to `wait` for output
    ///
    /// Returns `Ok(None)` when nothing arrived in the window or the channel
    /// has been closed by the remote side.
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` on transport failure.
    async fn poll_output(&mut self, wait: Duration) -> HopResult<Option<Vec<u8>>>;

    /// Returns false once either side closed the channel
    fn is_open(&self) -> bool;

    /// Closes the channel
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` if the close request could not be sent.
    async fn close(&mut self) -> HopResult<()>;
}
