//! Command catalog
//!
//! Maps a selection key to one command template or an ordered list of
//! them. `{ip}` in a template is replaced with the validated device
//! address before dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, HopError, HopResult};

/// Placeholder replaced by the device address
pub const ADDRESS_PLACEHOLDER: &str = "{ip}";

/// Placeholder replaced by the device account (hop command only)
pub const USER_PLACEHOLDER: &str = "{user}";

/// One catalog entry as stored in settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name
    pub name: String,
    /// Longer description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Single command template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Ordered command templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
}

impl CatalogEntry {
    /// Entry running one command
    #[must_use]
    pub fn single(name: &str, description: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            command: Some(command.to_string()),
            commands: None,
        }
    }

    /// Entry running several commands in order
    #[must_use]
    pub fn sequence(name: &str, description: &str, commands: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            command: None,
            commands: Some(commands.iter().map(ToString::to_string).collect()),
        }
    }

    /// Templates in execution order
    fn templates(&self) -> Vec<String> {
        match (&self.command, &self.commands) {
            (Some(command), None) => vec![command.clone()],
            (None, Some(commands)) => commands.clone(),
            _ => Vec::new(),
        }
    }

    fn validate(&self, key: &str) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::InvalidEntry {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        match (&self.command, &self.commands) {
            (Some(_), Some(_)) => Err(invalid("set either `command` or `commands`, not both")),
            (None, None) => Err(invalid("no command given")),
            (None, Some(list)) if list.is_empty() => Err(invalid("command list is empty")),
            _ if self.templates().iter().any(|t| t.trim().is_empty()) => {
                Err(invalid("empty command template"))
            }
            _ => Ok(()),
        }
    }
}

/// An immutable, selected command sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Selection key
    pub key: String,
    /// Display name
    pub name: String,
    /// Longer description
    pub description: String,
    templates: Vec<String>,
}

impl CommandSpec {
    /// Builds a spec directly from templates
    #[must_use]
    pub fn new(key: &str, name: &str, templates: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: String::new(),
            templates,
        }
    }

    /// Raw templates in order
    #[must_use]
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Number of commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if there are no commands
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Commands with `{ip}` replaced by `address` and `{user}` by `user`
    #[must_use]
    pub fn render(&self, address: &str, user: &str) -> Vec<String> {
        self.templates
            .iter()
            .map(|t| render_template(t, address, user))
            .collect()
    }
}

/// Replaces `{ip}` and `{user}` in `template`
#[must_use]
pub fn render_template(template: &str, address: &str, user: &str) -> String {
    template
        .replace(ADDRESS_PLACEHOLDER, address)
        .replace(USER_PLACEHOLDER, user)
}

/// Selection key → entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Default for CommandCatalog {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "ping".to_string(),
            CatalogEntry::single("Ping Test", "Test connectivity to STB", "ping -c 4 {ip}"),
        );
        entries.insert(
            "multicast".to_string(),
            CatalogEntry::single(
                "Multicast Test",
                "Test multicast streaming",
                "toish ms playuri udp://224.0.225.154:1234",
            ),
        );
        entries.insert(
            "reboot".to_string(),
            CatalogEntry::single("Reboot STB", "Restart the STB", "reboot"),
        );
        entries.insert(
            "standby".to_string(),
            CatalogEntry::sequence(
                "Standby Control",
                "Check and control standby mode",
                &[
                    "toish is getobject var.standby.mode",
                    "toish ps setstandby false",
                ],
            ),
        );
        Self { entries }
    }
}

impl CommandCatalog {
    /// An empty catalog
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or replaces an entry
    pub fn insert(&mut self, key: &str, entry: CatalogEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    /// Entries sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every entry
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEntry` for the first unusable entry.
    pub fn validate(&self) -> ConfigResult<()> {
        self.entries
            .iter()
            .try_for_each(|(key, entry)| entry.validate(key))
    }

    /// Resolves a selection key to its command sequence
    ///
    /// # Errors
    ///
    /// Returns `HopError::UnknownCommand` if the key is absent, or
    /// `HopError::Config` if the entry is unusable.
    pub fn select(&self, key: &str) -> HopResult<CommandSpec> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| HopError::UnknownCommand(key.to_string()))?;
        entry.validate(key)?;
        Ok(CommandSpec {
            key: key.to_string(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            templates: entry.templates(),
        })
    }
}
