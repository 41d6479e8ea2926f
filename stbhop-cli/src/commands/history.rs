//! Show the operation log.

use std::path::Path;

use stbhop_core::{OperationLog, OperationRecord};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::create_config_manager;

/// History command handler
pub fn cmd_history(
    config_path: Option<&Path>,
    limit: usize,
    format: OutputFormat,
) -> Result<(), CliError> {
    let manager = create_config_manager(config_path)?;
    let records = OperationLog::new(manager.operation_log_path()).recent(limit)?;

    match format {
        OutputFormat::Table => print_table(&records),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&records)
                .map_err(|e| CliError::Config(format!("Failed to serialize history: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn print_table(records: &[OperationRecord]) {
    if records.is_empty() {
        println!("No operations recorded.");
        return;
    }

    println!(
        "{:<20}  {:<20}  {:<15}  {:<12}  OUTCOME",
        "TIME", "HOST", "DEVICE", "COMMAND"
    );
    for record in records {
        let mut outcome = record.outcome.to_string();
        if let Some(ref error) = record.error {
            outcome.push_str(": ");
            outcome.push_str(error);
        }
        println!(
            "{:<20}  {:<20}  {:<15}  {:<12}  {outcome}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.host,
            record.device.as_deref().unwrap_or("-"),
            record.command,
        );
    }
}
