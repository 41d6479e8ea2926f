//! One-shot command on the proxy host.

use std::path::Path;

use crate::cli::ProxyArgs;
use crate::error::CliError;
use crate::util::{connect_request, create_console, load_settings, runtime, with_port};

/// Proxy exec command handler
pub fn cmd_proxy_exec(
    config_path: Option<&Path>,
    command: &str,
    pty: bool,
    proxy: &ProxyArgs,
) -> Result<(), CliError> {
    let (manager, settings) = load_settings(config_path)?;
    let settings = with_port(settings, proxy);
    let request = connect_request(&settings, proxy)?;
    let console = create_console(&manager, &settings)?;

    let output = runtime()?.block_on(async {
        console.connect(request).await?;
        let output = console.proxy_exec(command, pty).await;
        console.disconnect().await;
        output
    })?;

    print!("{}", output.stdout);
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }

    match output.exit_status {
        Some(0) | None => Ok(()),
        Some(status) => Err(CliError::Command(format!(
            "`{command}` exited with status {status}"
        ))),
    }
}
