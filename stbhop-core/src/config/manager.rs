//! Settings persistence

use std::path::{Path, PathBuf};

use super::settings::AppSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::tracing::span_names;

/// Environment variable selecting the configuration directory
pub const CONFIG_DIR_ENV: &str = "STBHOP_CONFIG_DIR";

const APP_DIR_NAME: &str = "stbhop";
const SETTINGS_FILE: &str = "config.toml";
const OPERATION_LOG_FILE: &str = "operations.jsonl";

/// Loads and saves settings in one configuration directory
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses `STBHOP_CONFIG_DIR`, else the platform config dir
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no directory can be determined.
    pub fn new() -> ConfigResult<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_config_dir(PathBuf::from(dir)));
        }
        let base = dirs::config_dir().ok_or(ConfigError::NotFound)?;
        Ok(Self::with_config_dir(base.join(APP_DIR_NAME)))
    }

    /// Uses an explicit directory
    #[must_use]
    pub const fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// The configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of `config.toml`
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Path of the operation log
    #[must_use]
    pub fn operation_log_path(&self) -> PathBuf {
        self.config_dir.join(OPERATION_LOG_FILE)
    }

    /// Returns true if `config.toml` exists
    #[must_use]
    pub fn settings_exist(&self) -> bool {
        self.settings_path().is_file()
    }

    /// Creates the configuration directory if needed
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the directory cannot be created.
    pub fn ensure_config_dir(&self) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })
    }

    /// Loads settings from disk, without environment overrides
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_settings(&self) -> ConfigResult<AppSettings> {
        let _span = tracing::debug_span!(span_names::CONFIG_LOAD).entered();
        let path = self.settings_path();

        let settings = if path.is_file() {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str::<AppSettings>(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            AppSettings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings and applies `PROXY_HOST`, `PROXY_USER`, `SSH_KEY_PATH`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_effective_settings(&self) -> ConfigResult<AppSettings> {
        let mut settings = self.load_settings()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Writes settings to `config.toml`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_settings(&self, settings: &AppSettings) -> ConfigResult<()> {
        self.ensure_config_dir()?;
        let text =
            toml::to_string_pretty(settings).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let path = self.settings_path();
        std::fs::write(&path, text).map_err(|source| ConfigError::Io { path, source })?;
        tracing::info!(path = %self.settings_path().display(), "Settings saved");
        Ok(())
    }
}
