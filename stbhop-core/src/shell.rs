//! Interactive shell driver
//!
//! Remote shells give no "command finished" signal over a raw pseudo-terminal,
//! so [`ShellDriver::drain`] infers completion from output silence: it keeps
//! polling until nothing new has arrived for a quiet period, or a hard
//! ceiling is hit. A command that pauses longer than the quiet period before
//! printing anything is reported as complete too early; the ceiling bounds
//! the worst-case wait.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::HopResult;
use crate::transport::InteractiveChannel;

/// Default interval between channel polls (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default output silence treated as command completion (milliseconds)
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 2000;

/// Default upper bound on a single drain (seconds)
pub const DEFAULT_DRAIN_CEILING_SECS: u64 = 30;

/// Default silence used to consume login banners (milliseconds)
pub const DEFAULT_SETTLE_MS: u64 = 1000;

/// Line terminator appended by [`ShellDriver::send`]
pub const LINE_TERMINATOR: &str = "\n";

/// Directive sent to end a remote shell
pub const EXIT_DIRECTIVE: &str = "exit";

/// Polling parameters for the quiet-period heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    /// Interval between polls
    pub poll_interval: Duration,
    /// Silence after which a command counts as finished
    pub quiet_period: Duration,
    /// Hard upper bound on one drain
    pub ceiling: Duration,
    /// Silence used to skip login banners
    pub settle: Duration,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            ceiling: Duration::from_secs(DEFAULT_DRAIN_CEILING_SECS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }
}

/// Drives one interactive channel: send lines, drain output, close
pub struct ShellDriver {
    channel: Box<dyn InteractiveChannel>,
    settings: DrainSettings,
}

impl std::fmt::Debug for ShellDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellDriver")
            .field("open", &self.channel.is_open())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ShellDriver {
    /// Wraps an open channel
    pub fn new(channel: Box<dyn InteractiveChannel>, settings: DrainSettings) -> Self {
        Self { channel, settings }
    }

    /// Polling parameters in use
    pub const fn settings(&self) -> &DrainSettings {
        &self.settings
    }

    /// Returns true while the underlying channel is open
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Sends `line` followed by a line terminator
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` if the write fails.
    pub async fn send(&mut self, line: &str) -> HopResult<()> {
        let mut data = String::with_capacity(line.len() + LINE_TERMINATOR.len());
        data.push_str(line);
        data.push_str(LINE_TERMINATOR);
        self.channel.write(data.as_bytes()).await
    }

    /// Sends raw bytes without a terminator
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` if the write fails.
    pub async fn send_raw(&mut self, data: &[u8]) -> HopResult<()> {
        self.channel.write(data).await
    }

    /// Reads whatever arrives within one poll interval
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` on transport failure.
    pub async fn poll_once(&mut self) -> HopResult<Option<Vec<u8>>> {
        self.channel.poll_output(self.settings.poll_interval).await
    }

    /// Accumulates output until `quiet_period` of silence or the ceiling
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` on transport failure.
    pub async fn drain(&mut self, quiet_period: Duration) -> HopResult<String> {
        let started = Instant::now();
        let mut last_output = started;
        let mut collected = Vec::new();

        loop {
            if let Some(chunk) = self.poll_once().await? {
                if !chunk.is_empty() {
                    collected.extend_from_slice(&chunk);
                    last_output = Instant::now();
                }
            } else if !self.channel.is_open() || last_output.elapsed() >= quiet_period {
                break;
            }

            if started.elapsed() >= self.settings.ceiling {
                tracing::debug!(
                    ceiling_ms = self.settings.ceiling.as_millis() as u64,
                    "Drain ceiling reached with output still arriving"
                );
                break;
            }
        }

        tracing::trace!(bytes = collected.len(), "Drained shell output");
        Ok(String::from_utf8_lossy(&collected).into_owned())
    }

    /// Drains with the configured command quiet period
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` on transport failure.
    pub async fn drain_command(&mut self) -> HopResult<String> {
        self.drain(self.settings.quiet_period).await
    }

    /// Drains with the shorter settle period, used around logins
    ///
    /// # Errors
    ///
    /// Returns `HopError::Channel` on transport failure.
    pub async fn settle(&mut self) -> HopResult<String> {
        self.drain(self.settings.settle).await
    }

    /// Sends the exit directive and closes the channel
    ///
    /// Failures are logged, never returned: cleanup has to proceed.
    pub async fn close(&mut self) {
        if !self.channel.is_open() {
            return;
        }
        if let Err(e) = self.send(EXIT_DIRECTIVE).await {
            tracing::warn!(error = %e, "Failed to send exit to remote shell");
        }
        if let Err(e) = self.channel.close().await {
            tracing::warn!(error = %e, "Failed to close shell channel");
        }
    }
}
