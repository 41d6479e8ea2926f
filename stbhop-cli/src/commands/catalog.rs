//! List the command catalog.

use std::path::Path;

use serde::Serialize;
use stbhop_core::CommandCatalog;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::load_settings;

#[derive(Serialize)]
struct CatalogRow<'a> {
    key: &'a str,
    name: &'a str,
    description: &'a str,
    commands: Vec<String>,
}

/// Commands listing handler
pub fn cmd_commands(config_path: Option<&Path>, format: OutputFormat) -> Result<(), CliError> {
    let (_, settings) = load_settings(config_path)?;
    let rows = catalog_rows(&settings.commands)?;

    match format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| CliError::Config(format!("Failed to serialize catalog: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn catalog_rows(catalog: &CommandCatalog) -> Result<Vec<CatalogRow<'_>>, CliError> {
    catalog
        .iter()
        .map(|(key, entry)| {
            let spec = catalog.select(key)?;
            Ok(CatalogRow {
                key,
                name: &entry.name,
                description: &entry.description,
                commands: spec.templates().to_vec(),
            })
        })
        .collect()
}

fn print_table(rows: &[CatalogRow<'_>]) {
    if rows.is_empty() {
        println!("No commands configured.");
        return;
    }

    let key_width = rows.iter().map(|r| r.key.len()).max().unwrap_or(3).max(3);
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);

    println!("{:<key_width$}  {:<name_width$}  COMMANDS", "KEY", "NAME");
    for row in rows {
        println!(
            "{:<key_width$}  {:<name_width$}  {}",
            row.key,
            row.name,
            row.commands.join(" ; ")
        );
    }
}
