//! Command sequence runner
//!
//! One run against one device:
//!
//! ```text
//! Init → Validating → LogStarted → ConnectingTarget → Authenticating
//!      → Executing → ClosingTarget → Cleanup → LogStopped → Done
//! ```
//!
//! `Error` can follow any state. Once the log monitor is running, the
//! cleanup states always execute before a failure is returned, so a run
//! never leaves a log utility behind on the proxy.
//!
//! Commands are dispatched with no completion check: a slow or failing
//! command does not stop the sequence, and the next command runs against
//! whatever state the remote shell is left in.

use std::time::Duration;

use secrecy::SecretString;
use tokio::time::{Instant, timeout_at};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::{AuthPromptHandler, PromptMatcher};
use crate::config::{CommandSpec, render_template};
use crate::error::{HopError, HopResult};
use crate::monitor::{LogMonitor, MonitorSettings};
use crate::shell::{DrainSettings, ShellDriver};
use crate::tracing::span_names;
use crate::transport::ProxyTransport;

/// Default hard deadline for the device-facing part of a run (seconds)
pub const DEFAULT_OPERATION_DEADLINE_SECS: u64 = 300;

/// Allowance for the stale-process kill on top of the log stop sequence
pub const CLEANUP_MARGIN_SECS: u64 = 30;

/// Stand-in for "no deadline" when a configured one overflows the clock
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// Header separating command outputs from captured log text
pub const LOG_SECTION_HEADER: &str = "--- log monitor output ---";

/// Returns true for four dot-separated decimal octets in `0..=255`
///
/// Each octet is one to three ASCII digits; nothing else is accepted.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    let mut octets = 0;
    for part in address.split('.') {
        octets += 1;
        if octets > 4
            || part.is_empty()
            || part.len() > 3
            || !part.bytes().all(|b| b.is_ascii_digit())
        {
            return false;
        }
        match part.parse::<u16>() {
            Ok(value) if value <= 255 => {}
            _ => return false,
        }
    }
    octets == 4
}

/// Validates a device address
///
/// # Errors
///
/// Returns `HopError::InvalidAddress` if `address` is not a valid
/// dotted-quad IPv4 address.
pub fn parse_device_address(address: &str) -> HopResult<&str> {
    if is_valid_address(address) {
        Ok(address)
    } else {
        Err(HopError::InvalidAddress(address.to_string()))
    }
}

/// Proxy command that kills every process matching `log_command`
///
/// The match is a plain substring search over `ps` output, so it can also
/// hit unrelated processes whose command line contains the same text.
#[must_use]
pub fn kill_stale_command(log_command: &str) -> String {
    format!(
        "ps -aux | grep \"{log_command}\" | grep -v grep | awk '{{print $2}}' | xargs -r kill -9"
    )
}

/// Kills leftover log utilities for `address` on the proxy
///
/// Best effort: failures are logged and never returned.
pub async fn kill_stale_log_processes<T>(transport: &T, address: &str, monitor: &MonitorSettings)
where
    T: ProxyTransport + ?Sized,
{
    let command = kill_stale_command(&monitor.command_for(address));
    let span = tracing::info_span!(span_names::CLEANUP_KILL_STALE, device = %address);

    match transport.run_command(&command, false).instrument(span).await {
        Ok(output) => tracing::debug!(
            device = %address,
            stdout = %output.stdout.trim(),
            stderr = %output.stderr.trim(),
            "Stale log process cleanup finished"
        ),
        Err(e) => tracing::warn!(device = %address, error = %e, "Stale log process cleanup failed"),
    }
}

/// Everything a run needs besides the transport
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Account used on the device
    pub device_user: String,
    /// Fixed device password
    pub device_password: SecretString,
    /// Hop command template (`{user}`, `{ip}`)
    pub hop_command: String,
    /// Deadline for the login prompts
    pub auth_timeout: Duration,
    /// Login prompt patterns
    pub prompts: PromptMatcher,
    /// Quiet-period polling
    pub drain: DrainSettings,
    /// Log capture
    pub monitor: MonitorSettings,
    /// Hard deadline for the device-facing part of a run
    pub operation_deadline: Duration,
}

impl RunnerSettings {
    /// Worst-case time spent in cleanup after the deadline
    #[must_use]
    pub fn cleanup_budget(&self) -> Duration {
        self.monitor
            .interrupt_grace
            .saturating_mul(2)
            .saturating_add(self.monitor.collection_window)
            .saturating_add(self.monitor.poll_interval)
            .saturating_add(Duration::from_secs(CLEANUP_MARGIN_SECS))
    }

    /// Outer bound on a whole run: the deadline plus the cleanup budget
    #[must_use]
    pub fn run_budget(&self) -> Duration {
        self.operation_deadline.saturating_add(self.cleanup_budget())
    }
}

/// `now + after`, clamped to a far-future instant
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(Duration::from_secs(FAR_FUTURE_SECS)))
        .unwrap_or(now)
}

/// States of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Not started
    Init,
    /// Checking the device address
    Validating,
    /// Log utility running
    LogStarted,
    /// Opening the shell and sending the hop command
    ConnectingTarget,
    /// Answering login prompts
    Authenticating,
    /// Running commands
    Executing,
    /// Closing the device session
    ClosingTarget,
    /// Killing stale log utilities
    Cleanup,
    /// Log capture stopped
    LogStopped,
    /// Finished successfully
    Done,
    /// A step failed
    Error,
}

/// Outputs of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// One entry per command, in order
    pub command_outputs: Vec<String>,
    /// Text captured by the log monitor
    pub log_output: String,
}

impl ExecutionResult {
    /// Command outputs joined by newlines, then the log section
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.command_outputs.join("\n");
        text.push('\n');
        text.push_str(LOG_SECTION_HEADER);
        text.push('\n');
        text.push_str(&self.log_output);
        text
    }
}

/// Drives one command sequence against one device
///
/// The transport is borrowed; callers serialise runs on a shared session.
pub struct CommandSequenceRunner<'a, T: ProxyTransport + ?Sized> {
    transport: &'a T,
    settings: &'a RunnerSettings,
    trail: Vec<RunState>,
}

impl<T: ProxyTransport + ?Sized> std::fmt::Debug for CommandSequenceRunner<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSequenceRunner")
            .field("host", &self.transport.host())
            .field("trail", &self.trail)
            .finish_non_exhaustive()
    }
}

impl<'a, T: ProxyTransport + ?Sized> CommandSequenceRunner<'a, T> {
    /// Creates a runner in `Init`
    #[must_use]
    pub fn new(transport: &'a T, settings: &'a RunnerSettings) -> Self {
        Self {
            transport,
            settings,
            trail: vec![RunState::Init],
        }
    }

    /// States visited so far, in order
    #[must_use]
    pub fn trail(&self) -> &[RunState] {
        &self.trail
    }

    /// Most recent state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.trail.last().copied().unwrap_or(RunState::Init)
    }

    /// Returns true if any step failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.trail.contains(&RunState::Error)
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state(), to = ?next, "Run state transition");
        self.trail.push(next);
    }

    /// Runs `spec` against the device at `address`
    ///
    /// # Errors
    ///
    /// Returns the first failure; cleanup failures are only logged.
    pub async fn run(&mut self, address: &str, spec: &CommandSpec) -> HopResult<ExecutionResult> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            span_names::RUN_EXECUTE,
            run_id = %run_id,
            device = %address,
            command_key = %spec.key
        );
        self.run_sequence(address, spec).instrument(span).await
    }

    async fn run_sequence(&mut self, address: &str, spec: &CommandSpec) -> HopResult<ExecutionResult> {
        self.transition(RunState::Validating);
        if let Err(e) = parse_device_address(address) {
            self.transition(RunState::Error);
            return Err(e);
        }
        if !self.transport.is_connected() {
            self.transition(RunState::Error);
            return Err(HopError::not_connected(self.transport.host()));
        }

        let mut monitor =
            match LogMonitor::start(self.transport, address, &self.settings.monitor).await {
                Ok(handle) => handle,
                Err(e) => {
                    self.transition(RunState::Error);
                    return Err(e);
                }
            };
        self.transition(RunState::LogStarted);

        let started = Instant::now();
        let outcome = self.drive_device(address, spec).await;

        self.transition(RunState::Cleanup);
        kill_stale_log_processes(self.transport, address, &self.settings.monitor).await;

        let log_output = monitor.stop().await;
        self.transition(RunState::LogStopped);

        match outcome {
            Ok(command_outputs) => {
                self.transition(RunState::Done);
                tracing::info!(
                    commands = command_outputs.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Command sequence completed"
                );
                Ok(ExecutionResult {
                    command_outputs,
                    log_output,
                })
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    log_bytes = log_output.len(),
                    "Command sequence failed"
                );
                Err(e)
            }
        }
    }

    /// Shell open, hop, login, commands, close
    async fn drive_device(&mut self, address: &str, spec: &CommandSpec) -> HopResult<Vec<String>> {
        let deadline = deadline_after(self.settings.operation_deadline);
        let seconds = self.settings.operation_deadline.as_secs();
        let deadline_error = move || HopError::OperationTimeout {
            address: address.to_string(),
            seconds,
        };

        self.transition(RunState::ConnectingTarget);
        let channel = match timeout_at(deadline, self.transport.open_interactive_channel()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                self.transition(RunState::Error);
                return Err(e);
            }
            Err(_) => {
                self.transition(RunState::Error);
                return Err(deadline_error());
            }
        };
        let mut shell = ShellDriver::new(channel, self.settings.drain);

        let outcome = timeout_at(deadline, self.converse(&mut shell, address, spec))
            .await
            .unwrap_or_else(|_| {
                tracing::error!("Operation deadline reached");
                Err(deadline_error())
            });
        if outcome.is_err() {
            self.transition(RunState::Error);
        }

        self.transition(RunState::ClosingTarget);
        shell.close().await;
        outcome
    }

    async fn converse(
        &mut self,
        shell: &mut ShellDriver,
        address: &str,
        spec: &CommandSpec,
    ) -> HopResult<Vec<String>> {
        shell.settle().await?;
        let hop = render_template(&self.settings.hop_command, address, &self.settings.device_user);
        tracing::info!(device = %address, "Hopping to device");
        shell.send(&hop).await?;

        self.transition(RunState::Authenticating);
        let mut auth = AuthPromptHandler::new(
            self.settings.prompts.clone(),
            self.settings.device_password.clone(),
            self.settings.auth_timeout,
        );
        let span = tracing::info_span!(span_names::RUN_AUTHENTICATE, device = %address);
        auth.authenticate(shell, address).instrument(span).await?;
        shell.settle().await?;

        self.transition(RunState::Executing);
        let mut outputs = Vec::with_capacity(spec.len());
        for command in spec.render(address, &self.settings.device_user) {
            outputs.push(run_one(shell, &command).await);
        }
        Ok(outputs)
    }
}

/// Sends one command and drains its output; failures yield an empty output
async fn run_one(shell: &mut ShellDriver, command: &str) -> String {
    tracing::info!(command = %command, "Executing device command");
    if let Err(e) = shell.send(command).await {
        tracing::warn!(command = %command, error = %e, "Failed to send command");
        return String::new();
    }
    match shell.drain_command().await {
        Ok(output) => {
            tracing::debug!(command = %command, bytes = output.len(), "Command output drained");
            output
        }
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "Failed to read command output");
            String::new()
        }
    }
}
