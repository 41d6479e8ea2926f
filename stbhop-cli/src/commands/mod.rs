//! Command handler modules for the CLI.

mod catalog;
mod check;
mod completions;
mod config;
mod history;
mod proxy_exec;
mod run;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(config_path: Option<&Path>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run {
            device,
            command,
            proxy,
            format,
        } => run::cmd_run(config_path, &device, &command, &proxy, format),
        Commands::ProxyExec {
            command,
            pty,
            proxy,
        } => proxy_exec::cmd_proxy_exec(config_path, &command, pty, &proxy),
        Commands::Commands { format } => catalog::cmd_commands(config_path, format),
        Commands::Check { address } => check::cmd_check(&address),
        Commands::History { limit, format } => history::cmd_history(config_path, limit, format),
        Commands::Config(subcmd) => config::cmd_config(config_path, subcmd),
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
