//! Configuration management for `stbhop`
//!
//! This module provides the `ConfigManager` for loading and saving
//! `config.toml`, the settings it holds and the command catalog.

mod catalog;
mod manager;
pub mod settings;

pub use catalog::{
    ADDRESS_PLACEHOLDER, CatalogEntry, CommandCatalog, CommandSpec, USER_PLACEHOLDER,
    render_template,
};
pub use manager::{CONFIG_DIR_ENV, ConfigManager};
pub use settings::{
    AppSettings, DeviceSettings, LogMonitorSettings, ProxySettings, RunSettings, ShellSettings,
};
