//! Device login prompt handling
//!
//! After the hop command is sent, the device side of the nested session is
//! a raw terminal stream. [`AuthPromptHandler`] scrapes it for two prompts,
//! in priority order, and answers them:
//!
//! 1. the host-key confirmation (`yes/no`), answered with `yes`
//! 2. the password prompt (`password:`, any case), answered with the device
//!    password
//!
//! Prompt text may arrive split over any number of reads, so output is
//! accumulated as bytes and re-tested after every chunk. Once a prompt has
//! been answered only output received after it is considered.

use std::time::Duration;

use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use crate::error::{ConfigError, ConfigResult, HopError, HopResult};
use crate::shell::ShellDriver;

/// Host-key confirmation prompt emitted by the device-side ssh client
pub const HOST_KEY_PROMPT_PATTERN: &str = r"yes/no";

/// Password prompt, matched case-insensitively
pub const PASSWORD_PROMPT_PATTERN: &str = r"(?i)password:";

/// Reply sent to a host-key confirmation prompt
pub const HOST_KEY_CONFIRMATION: &str = "yes";

/// Default deadline for resolving the login prompts (seconds)
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Progress of a device login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Nothing answered yet; a host-key prompt may still appear
    AwaitingHostKey,
    /// Host key confirmed, waiting for the password prompt
    ///
    /// Entered as soon as "yes" is sent, so the host-key prompt is never
    /// answered twice. A password prompt is still recognised while in
    /// `AwaitingHostKey`, for devices that never ask about the host key.
    AwaitingPassword,
    /// Password sent
    Authenticated,
    /// Deadline passed without a password prompt
    TimedOut,
}

impl AuthState {
    /// Returns true for `Authenticated` and `TimedOut`
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::TimedOut)
    }
}

/// Which prompt a rule recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Host-key confirmation
    HostKey,
    /// Password request
    Password,
}

/// Answer owed to the remote side after a prompt matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    /// Send [`HOST_KEY_CONFIRMATION`]
    ConfirmHostKey,
    /// Send the device password
    Password,
}

/// A compiled prompt pattern
#[derive(Debug, Clone)]
struct PromptRule {
    kind: PromptKind,
    regex: Regex,
}

impl PromptRule {
    fn compile(kind: PromptKind, pattern: &str) -> ConfigResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { kind, regex })
    }
}

/// The prompt rules, host-key first
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    rules: Vec<PromptRule>,
}

impl PromptMatcher {
    /// Compiles custom prompt patterns
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if either pattern is invalid.
    pub fn new(host_key_pattern: &str, password_pattern: &str) -> ConfigResult<Self> {
        Ok(Self {
            rules: vec![
                PromptRule::compile(PromptKind::HostKey, host_key_pattern)?,
                PromptRule::compile(PromptKind::Password, password_pattern)?,
            ],
        })
    }

    /// Compiles [`HOST_KEY_PROMPT_PATTERN`] and [`PASSWORD_PROMPT_PATTERN`]
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if a built-in pattern is invalid.
    pub fn standard() -> ConfigResult<Self> {
        Self::new(HOST_KEY_PROMPT_PATTERN, PASSWORD_PROMPT_PATTERN)
    }

    /// Finds the first rule (in priority order) matching `output`
    ///
    /// Returns the prompt kind and the byte offset just past the match.
    /// Rules for which `skip` returns true are ignored.
    fn find(&self, output: &[u8], skip: impl Fn(PromptKind) -> bool) -> Option<(PromptKind, usize)> {
        self.rules
            .iter()
            .filter(|rule| !skip(rule.kind))
            .find_map(|rule| rule.regex.find(output).map(|m| (rule.kind, m.end())))
    }
}

/// Answers the device login prompts within a deadline
pub struct AuthPromptHandler {
    matcher: PromptMatcher,
    password: SecretString,
    deadline: Duration,
    state: AuthState,
    pending: Vec<u8>,
}

impl std::fmt::Debug for AuthPromptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPromptHandler")
            .field("deadline", &self.deadline)
            .field("state", &self.state)
            .field("pending_bytes", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl AuthPromptHandler {
    /// Creates a handler in `AwaitingHostKey`
    #[must_use]
    pub const fn new(matcher: PromptMatcher, password: SecretString, deadline: Duration) -> Self {
        Self {
            matcher,
            password,
            deadline,
            state: AuthState::AwaitingHostKey,
            pending: Vec::new(),
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Feeds one chunk of output and returns the answers it calls for
    ///
    /// Several prompts may resolve in one chunk; answers are returned in
    /// the order they must be sent. Nothing is returned once terminal.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<PromptResponse> {
        let mut responses = Vec::new();
        if self.state.is_terminal() {
            return responses;
        }
        self.pending.extend_from_slice(chunk);

        loop {
            let host_key_answered = self.state == AuthState::AwaitingPassword;
            let Some((kind, end)) = self.matcher.find(&self.pending, |kind| {
                kind == PromptKind::HostKey && host_key_answered
            }) else {
                break;
            };
            self.pending.drain(..end);
            match kind {
                PromptKind::HostKey => {
                    tracing::debug!("Host-key prompt detected");
                    self.state = AuthState::AwaitingPassword;
                    responses.push(PromptResponse::ConfirmHostKey);
                }
                PromptKind::Password => {
                    tracing::debug!("Password prompt detected");
                    self.state = AuthState::Authenticated;
                    self.pending.clear();
                    responses.push(PromptResponse::Password);
                    break;
                }
            }
        }
        responses
    }

    /// Line to send for `response`
    fn reply_for(&self, response: PromptResponse) -> &str {
        match response {
            PromptResponse::ConfirmHostKey => HOST_KEY_CONFIRMATION,
            PromptResponse::Password => self.password.expose_secret(),
        }
    }

    /// Polls `shell` until the password has been sent or the deadline passes
    ///
    /// # Errors
    ///
    /// Returns `HopError::AuthenticationTimeout` if no password prompt was
    /// seen in time, or `HopError::Channel` if the channel fails.
    pub async fn authenticate(&mut self, shell: &mut ShellDriver, address: &str) -> HopResult<()> {
        let started = Instant::now();

        while started.elapsed() < self.deadline {
            match shell.poll_once().await? {
                Some(chunk) => {
                    for response in self.feed(&chunk) {
                        shell.send(self.reply_for(response)).await?;
                    }
                }
                None if !shell.is_open() => break,
                None => {}
            }

            if self.state == AuthState::Authenticated {
                tracing::info!(device = %address, "Device login completed");
                return Ok(());
            }
        }

        self.state = AuthState::TimedOut;
        tracing::error!(
            device = %address,
            timeout_secs = self.deadline.as_secs(),
            "Device login prompts not resolved in time"
        );
        Err(HopError::AuthenticationTimeout {
            address: address.to_string(),
            seconds: self.deadline.as_secs(),
        })
    }
}
