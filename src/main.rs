// ABOUTME: Entry point for the jumpchain CLI application.
// ABOUTME: Parses arguments and dispatches to init, check, and exec.

mod cli;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use jumpchain::config::{self, ChainConfig};
use jumpchain::diagnostics::Diagnostics;
use jumpchain::error::Result;
use jumpchain::ssh::RusshTransport;
use output::Output;
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output);
    match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            let chain = config.chain()?;
            output.success(&chain.path_description());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Exec { command } => {
            let config = load_config(cli.config.as_deref())?;
            exec(&config, &command.join(" "), output).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ChainConfig> {
    match path {
        Some(path) => ChainConfig::load(path),
        None => ChainConfig::discover(&env::current_dir()?),
    }
}

/// Connect through the chain, run `command`, and mirror its exit status.
async fn exec(config: &ChainConfig, command: &str, output: &Output) -> Result<ExitCode> {
    let chain = config.chain()?;
    output.progress(&format!("  → {}", chain.path_description()));

    let mut rollback = Diagnostics::default();
    let connected = config
        .connector(RusshTransport::new())
        .connect_with_diagnostics(&chain, &mut rollback)
        .await;
    output.warnings(rollback.warnings());
    let session = connected?;
    output.progress(&format!("  → Running `{}` on {}", command, session.destination()));

    // Close before reporting so a failed command still tears the chain down.
    let result = session.exec(command).await;
    let diagnostics = session.close().await;
    output.warnings(diagnostics.warnings());

    let remote = result?;
    output.command(&remote);
    Ok(ExitCode::from(u8::try_from(remote.exit_code).unwrap_or(u8::MAX)))
}
