// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jumpchain")]
#[command(about = "Run commands on a host reachable only through SSH jump hosts")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Chain file to use instead of discovering jumpchain.yml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Normal, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Normal,
    Quiet,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new jumpchain.yml configuration file
    Init {
        /// Overwrite an existing jumpchain.yml
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the chain file and print the hop path
    Check,

    /// Connect through the chain and run a command on the destination
    Exec {
        /// Command and arguments to run remotely
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}
