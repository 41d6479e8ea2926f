//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Run commands on set-top boxes reachable only through an SSH proxy
#[derive(Parser)]
#[command(name = "stbhop")]
#[command(author, version, about = "Set-top box command runner")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a catalog command sequence on a device
    #[command(about = "Run a catalog command on a device behind the proxy")]
    Run {
        /// Device IPv4 address
        device: String,

        /// Catalog key of the command sequence (see `stbhop commands`)
        command: String,

        #[command(flatten)]
        proxy: ProxyArgs,

        /// Output format for the results
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Run one non-interactive command on the proxy
    #[command(about = "Run a single command on the proxy host")]
    ProxyExec {
        /// Command line executed by the proxy shell
        command: String,

        /// Request a pseudo-terminal
        #[arg(long)]
        pty: bool,

        #[command(flatten)]
        proxy: ProxyArgs,
    },

    /// List the command catalog
    #[command(about = "List the commands that can be run on a device")]
    Commands {
        /// Output format for the catalog
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Validate a device address
    #[command(about = "Check that a device address is a dotted IPv4 address")]
    Check {
        /// Address to validate
        address: String,
    },

    /// Show recent operations
    #[command(about = "Show the most recent operations")]
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format for the entries
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Proxy connection options shared by commands that connect
#[derive(Args, Debug, Clone, Default)]
pub struct ProxyArgs {
    /// Proxy host name or address
    #[arg(short = 'H', long, env = "PROXY_HOST")]
    pub host: Option<String>,

    /// Proxy account
    #[arg(short, long, env = "PROXY_USER")]
    pub user: Option<String>,

    /// Private key used for the proxy login
    #[arg(short, long, env = "SSH_KEY_PATH")]
    pub key: Option<PathBuf>,

    /// Proxy SSH port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Prompt for the private key passphrase
    #[arg(long)]
    pub ask_passphrase: bool,

    /// Private key passphrase
    #[arg(long, env = "STBHOP_PASSPHRASE", hide = true, hide_env_values = true)]
    pub passphrase: Option<String>,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    #[command(about = "Create config.toml with default settings")]
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    #[command(about = "Print the effective configuration as TOML")]
    Show,

    /// Print the configuration file path
    #[command(about = "Print the path of config.toml")]
    Path,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable table or text
    #[default]
    Table,
    /// JSON
    Json,
}
