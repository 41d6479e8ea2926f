//! Run a catalog command sequence on a device.

use std::path::Path;

use serde::Serialize;
use stbhop_core::{ExecutionResult, parse_device_address};

use crate::cli::{OutputFormat, ProxyArgs};
use crate::error::CliError;
use crate::util::{connect_request, create_console, load_settings, runtime, with_port};

/// JSON shape of a finished run
#[derive(Serialize)]
struct RunReport<'a> {
    device: &'a str,
    command: &'a str,
    outputs: &'a [String],
    log: &'a str,
}

/// Run command handler
pub fn cmd_run(
    config_path: Option<&Path>,
    device: &str,
    key: &str,
    proxy: &ProxyArgs,
    format: OutputFormat,
) -> Result<(), CliError> {
    let (manager, settings) = load_settings(config_path)?;
    let settings = with_port(settings, proxy);

    // Reject bad input before touching the network
    parse_device_address(device)?;
    settings.commands.select(key)?;

    let request = connect_request(&settings, proxy)?;
    let console = create_console(&manager, &settings)?;
    tracing::debug!(proxy = %request.host, device, command = key, "Dispatching run");

    let result = runtime()?.block_on(async {
        console.connect(request).await?;
        let result = console.execute(device, key).await;
        console.disconnect().await;
        result
    })?;

    print_result(device, key, &result, format)
}

fn print_result(
    device: &str,
    key: &str,
    result: &ExecutionResult,
    format: OutputFormat,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Table => println!("{}", result.render()),
        OutputFormat::Json => {
            let report = RunReport {
                device,
                command: key,
                outputs: &result.command_outputs,
                log: &result.log_output,
            };
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::Command(format!("Failed to serialize result: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}
