//! Application settings
//!
//! Every section and field falls back to its default when missing, so a
//! partial `config.toml` is always valid.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use super::catalog::CommandCatalog;
use crate::auth::{
    DEFAULT_AUTH_TIMEOUT_SECS, HOST_KEY_PROMPT_PATTERN, PASSWORD_PROMPT_PATTERN, PromptMatcher,
};
use crate::error::{ConfigError, ConfigResult};
use crate::monitor::{
    DEFAULT_COLLECTION_WINDOW_SECS, DEFAULT_INTERRUPT_GRACE_MS, DEFAULT_LOG_COMMAND,
    MonitorSettings,
};
use crate::runner::{DEFAULT_OPERATION_DEADLINE_SECS, RunnerSettings};
use crate::shell::{
    DEFAULT_DRAIN_CEILING_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUIET_PERIOD_MS,
    DEFAULT_SETTLE_MS, DrainSettings,
};
use crate::transport::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, TransportSettings,
};

/// Default private key used for the proxy
pub const DEFAULT_KEY_PATH: &str = "~/.ssh/id_rsa";

/// Default SSH port of the proxy
pub const DEFAULT_PROXY_PORT: u16 = 22;

/// Default account on the device
pub const DEFAULT_DEVICE_USER: &str = "root";

/// Default device password
pub const DEFAULT_DEVICE_PASSWORD: &str = "kreatv";

/// Default hop command run on the proxy; `{user}` and `{ip}` are substituted
pub const DEFAULT_HOP_COMMAND: &str = "ssh -o StrictHostKeyChecking=no {user}@{ip}";

/// Upper bound on every configured timeout, window and deadline (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Environment variable overriding the proxy host
pub const ENV_PROXY_HOST: &str = "PROXY_HOST";

/// Environment variable overriding the proxy user
pub const ENV_PROXY_USER: &str = "PROXY_USER";

/// Environment variable overriding the private key path
pub const ENV_SSH_KEY_PATH: &str = "SSH_KEY_PATH";

/// Root settings document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Proxy connection defaults
    pub proxy: ProxySettings,
    /// Device login
    pub device: DeviceSettings,
    /// Quiet-period polling
    pub shell: ShellSettings,
    /// Log capture
    pub monitor: LogMonitorSettings,
    /// Whole-run limits
    pub run: RunSettings,
    /// Command catalog
    pub commands: CommandCatalog,
}

/// Proxy connection defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Proxy host name or address
    pub host: String,
    /// Proxy account
    pub username: String,
    /// Private key, `~` is expanded at connect time
    pub key_path: PathBuf,
    /// SSH port
    pub port: u16,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Non-interactive command timeout in seconds
    pub command_timeout_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            port: DEFAULT_PROXY_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl ProxySettings {
    /// Transport limits derived from these settings
    #[must_use]
    pub const fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
        }
    }
}

/// Device login settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Account used on the device
    pub user: String,
    /// Fixed device password
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
    /// Hop command template
    pub hop_command: String,
    /// Deadline for the login prompts in seconds
    pub auth_timeout_secs: u64,
    /// Host-key confirmation prompt pattern
    pub host_key_prompt: String,
    /// Password prompt pattern
    pub password_prompt: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            user: DEFAULT_DEVICE_USER.to_string(),
            password: SecretString::from(DEFAULT_DEVICE_PASSWORD),
            hop_command: DEFAULT_HOP_COMMAND.to_string(),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            host_key_prompt: HOST_KEY_PROMPT_PATTERN.to_string(),
            password_prompt: PASSWORD_PROMPT_PATTERN.to_string(),
        }
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Quiet-period polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    /// Interval between polls in milliseconds
    pub poll_interval_ms: u64,
    /// Output silence treated as completion in milliseconds
    pub quiet_period_ms: u64,
    /// Upper bound on one drain in seconds
    pub ceiling_secs: u64,
    /// Banner settle period in milliseconds
    pub settle_ms: u64,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            ceiling_secs: DEFAULT_DRAIN_CEILING_SECS,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl ShellSettings {
    /// Drain parameters derived from these settings
    #[must_use]
    pub const fn drain_settings(&self) -> DrainSettings {
        DrainSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            quiet_period: Duration::from_millis(self.quiet_period_ms),
            ceiling: Duration::from_secs(self.ceiling_secs),
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

/// Log capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMonitorSettings {
    /// Log utility template
    pub log_command: String,
    /// Pause after each stop directive in milliseconds
    pub interrupt_grace_ms: u64,
    /// Trailing output window in seconds
    pub collection_window_secs: u64,
}

impl Default for LogMonitorSettings {
    fn default() -> Self {
        Self {
            log_command: DEFAULT_LOG_COMMAND.to_string(),
            interrupt_grace_ms: DEFAULT_INTERRUPT_GRACE_MS,
            collection_window_secs: DEFAULT_COLLECTION_WINDOW_SECS,
        }
    }
}

/// Whole-run limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Hard deadline for one run in seconds
    pub operation_deadline_secs: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            operation_deadline_secs: DEFAULT_OPERATION_DEADLINE_SECS,
        }
    }
}

impl AppSettings {
    /// Checks templates, patterns and the catalog
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.device.hop_command.contains("{ip}") {
            return Err(ConfigError::InvalidEntry {
                key: "device.hop_command".to_string(),
                reason: "template must contain {ip}".to_string(),
            });
        }
        if !self.monitor.log_command.contains("{ip}") {
            return Err(ConfigError::InvalidEntry {
                key: "monitor.log_command".to_string(),
                reason: "template must contain {ip}".to_string(),
            });
        }
        if self.shell.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidEntry {
                key: "shell.poll_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        for (key, value) in self.timeouts() {
            if value > Duration::from_secs(MAX_TIMEOUT_SECS) {
                return Err(ConfigError::InvalidEntry {
                    key: key.to_string(),
                    reason: format!("must not exceed {MAX_TIMEOUT_SECS} seconds"),
                });
            }
        }
        PromptMatcher::new(&self.device.host_key_prompt, &self.device.password_prompt)?;
        self.commands.validate()
    }

    fn timeouts(&self) -> [(&'static str, Duration); 10] {
        [
            ("proxy.connect_timeout_secs", Duration::from_secs(self.proxy.connect_timeout_secs)),
            ("proxy.command_timeout_secs", Duration::from_secs(self.proxy.command_timeout_secs)),
            ("device.auth_timeout_secs", Duration::from_secs(self.device.auth_timeout_secs)),
            ("shell.poll_interval_ms", Duration::from_millis(self.shell.poll_interval_ms)),
            ("shell.quiet_period_ms", Duration::from_millis(self.shell.quiet_period_ms)),
            ("shell.ceiling_secs", Duration::from_secs(self.shell.ceiling_secs)),
            ("shell.settle_ms", Duration::from_millis(self.shell.settle_ms)),
            ("monitor.interrupt_grace_ms", Duration::from_millis(self.monitor.interrupt_grace_ms)),
            (
                "monitor.collection_window_secs",
                Duration::from_secs(self.monitor.collection_window_secs),
            ),
            ("run.operation_deadline_secs", Duration::from_secs(self.run.operation_deadline_secs)),
        ]
    }

    /// Applies environment overrides through `lookup`
    ///
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(host) = lookup(ENV_PROXY_HOST) {
            self.proxy.host = host;
        }
        if let Some(user) = lookup(ENV_PROXY_USER) {
            self.proxy.username = user;
        }
        if let Some(path) = lookup(ENV_SSH_KEY_PATH) {
            self.proxy.key_path = PathBuf::from(path);
        }
    }

    /// Applies overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Engine parameters derived from these settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if a prompt pattern is invalid.
    pub fn runner_settings(&self) -> ConfigResult<RunnerSettings> {
        let drain = self.shell.drain_settings();
        Ok(RunnerSettings {
            device_user: self.device.user.clone(),
            device_password: self.device.password.clone(),
            hop_command: self.device.hop_command.clone(),
            auth_timeout: Duration::from_secs(self.device.auth_timeout_secs),
            prompts: PromptMatcher::new(
                &self.device.host_key_prompt,
                &self.device.password_prompt,
            )?,
            drain,
            monitor: MonitorSettings {
                log_command: self.monitor.log_command.clone(),
                interrupt_grace: Duration::from_millis(self.monitor.interrupt_grace_ms),
                collection_window: Duration::from_secs(self.monitor.collection_window_secs),
                poll_interval: drain.poll_interval,
            },
            operation_deadline: Duration::from_secs(self.run.operation_deadline_secs),
        })
    }
}
