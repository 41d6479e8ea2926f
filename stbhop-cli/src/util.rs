//! Shared utility functions used across command modules.

use std::path::Path;

use secrecy::SecretString;
use stbhop_core::{
    AppSettings, ConfigManager, ConnectRequest, OperationLog, OperatorConsole, TracingConfig,
    TracingLevel, TracingOutput, TracingResult, TransportSession, init_tracing,
};

use crate::cli::ProxyArgs;
use crate::error::CliError;

/// Creates a `ConfigManager` using the optional custom config directory
/// from CLI args.
pub fn create_config_manager(config_path: Option<&Path>) -> Result<ConfigManager, CliError> {
    match config_path {
        Some(path) => Ok(ConfigManager::with_config_dir(path.to_path_buf())),
        None => ConfigManager::new()
            .map_err(|e| CliError::Config(format!("Failed to initialize config: {e}"))),
    }
}

/// Loads settings with environment overrides applied
pub fn load_settings(config_path: Option<&Path>) -> Result<(ConfigManager, AppSettings), CliError> {
    let manager = create_config_manager(config_path)?;
    let settings = manager
        .load_effective_settings()
        .map_err(|e| CliError::Config(format!("Failed to load settings: {e}")))?;
    Ok((manager, settings))
}

/// Sets up the tracing subscriber from the global flags
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> TracingResult<()> {
    let level = if quiet {
        TracingLevel::Error
    } else {
        TracingLevel::from_verbosity(verbose)
    };
    let output = log_file.map_or(TracingOutput::Stderr, |path| TracingOutput::File {
        path: path.to_path_buf(),
    });
    init_tracing(&TracingConfig::new().with_level(level).with_output(output))
}

/// Creates a current-thread runtime for one command
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Config(format!("Failed to create async runtime: {e}")))
}

/// Builds the proxy connection request from flags over settings
pub fn connect_request(settings: &AppSettings, args: &ProxyArgs) -> Result<ConnectRequest, CliError> {
    let host = args.host.clone().unwrap_or_else(|| settings.proxy.host.clone());
    if host.is_empty() {
        return Err(CliError::Config(
            "proxy host is not set; use --host or PROXY_HOST".to_string(),
        ));
    }
    let username = args
        .user
        .clone()
        .unwrap_or_else(|| settings.proxy.username.clone());
    if username.is_empty() {
        return Err(CliError::Config(
            "proxy user is not set; use --user or PROXY_USER".to_string(),
        ));
    }
    let key_path = args
        .key
        .clone()
        .unwrap_or_else(|| settings.proxy.key_path.clone());

    let passphrase = if args.ask_passphrase {
        let entered = rpassword::prompt_password("Key passphrase: ")?;
        Some(SecretString::from(entered))
    } else {
        args.passphrase.clone().map(SecretString::from)
    };

    Ok(ConnectRequest {
        host,
        username,
        key_path,
        passphrase,
    })
}

/// Builds a console that records operations next to the config file
pub fn create_console(
    manager: &ConfigManager,
    settings: &AppSettings,
) -> Result<OperatorConsole<TransportSession>, CliError> {
    let console = OperatorConsole::new(settings)?;
    Ok(console.with_operation_log(OperationLog::new(manager.operation_log_path())))
}

/// Settings with the `--port` flag applied
pub fn with_port(mut settings: AppSettings, args: &ProxyArgs) -> AppSettings {
    if let Some(port) = args.port {
        settings.proxy.port = port;
    }
    settings
}
