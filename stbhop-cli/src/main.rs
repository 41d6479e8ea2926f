//! `stbhop` CLI - run set-top box commands through an SSH proxy
//!
//! Connects to the proxy, hops to a device, runs a catalog command sequence
//! while capturing the device log, and prints the outputs.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = util::init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Warning: logging disabled: {e}");
    }

    let result = commands::dispatch(cli.config.as_deref(), cli.command);

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
