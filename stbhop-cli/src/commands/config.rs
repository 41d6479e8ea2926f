//! Configuration management commands.

use std::path::Path;

use secrecy::SecretString;

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::util::{create_config_manager, load_settings};

const MASKED_PASSWORD: &str = "********";

/// Config command handler
pub fn cmd_config(config_path: Option<&Path>, subcmd: ConfigCommands) -> Result<(), CliError> {
    match subcmd {
        ConfigCommands::Init { force } => cmd_init(config_path, force),
        ConfigCommands::Show => cmd_show(config_path),
        ConfigCommands::Path => {
            let manager = create_config_manager(config_path)?;
            println!("{}", manager.settings_path().display());
            Ok(())
        }
    }
}

fn cmd_init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let manager = create_config_manager(config_path)?;
    if manager.settings_exist() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite",
            manager.settings_path().display()
        )));
    }
    manager.save_settings(&stbhop_core::AppSettings::default())?;
    println!("Wrote {}", manager.settings_path().display());
    Ok(())
}

fn cmd_show(config_path: Option<&Path>) -> Result<(), CliError> {
    let (_, mut settings) = load_settings(config_path)?;
    settings.device.password = SecretString::from(MASKED_PASSWORD);
    let text = toml::to_string_pretty(&settings)
        .map_err(|e| CliError::Config(format!("Failed to serialize settings: {e}")))?;
    print!("{text}");
    Ok(())
}
