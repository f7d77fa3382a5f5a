// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Normal and quiet modes print text; JSON mode prints one event per line.

use crate::cli::OutputFormat;
use jumpchain::diagnostics::Warning;
use jumpchain::ssh::CommandOutput;
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Writes CLI feedback in the selected format.
pub struct Output {
    format: OutputFormat,
    started: Instant,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            started: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Step messages; normal mode only.
    pub fn progress(&self, message: &str) {
        if self.format == OutputFormat::Normal {
            println!("{message}");
        }
    }

    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Normal => println!("{message} ({:.1}s)", self.elapsed_secs()),
            OutputFormat::Quiet => println!("{message}"),
            OutputFormat::Json => emit(&Event::Message {
                event: "success",
                message,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }

    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Normal | OutputFormat::Quiet => eprintln!("Error: {message}"),
            OutputFormat::Json => emit_err(&Event::Message {
                event: "error",
                message,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }

    /// Teardown warnings never change the exit status.
    pub fn warnings(&self, warnings: &[Warning]) {
        for warning in warnings {
            let message = warning.to_string();
            match self.format {
                OutputFormat::Normal => eprintln!("Warning: {message}"),
                OutputFormat::Quiet => {}
                OutputFormat::Json => emit_err(&Event::Message {
                    event: "warning",
                    message: &message,
                    duration_secs: self.elapsed_secs(),
                }),
            }
        }
    }

    /// Remote output is passed through untouched except in JSON mode.
    pub fn command(&self, output: &CommandOutput) {
        match self.format {
            OutputFormat::Normal | OutputFormat::Quiet => {
                let _ = std::io::stdout().write_all(output.stdout.as_bytes());
                let _ = std::io::stderr().write_all(output.stderr.as_bytes());
            }
            OutputFormat::Json => emit(&Event::Command {
                event: "command",
                exit_code: output.exit_code,
                stdout: &output.stdout,
                stderr: &output.stderr,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Event<'a> {
    Message {
        event: &'a str,
        message: &'a str,
        duration_secs: f64,
    },
    Command {
        event: &'a str,
        exit_code: u32,
        stdout: &'a str,
        stderr: &'a str,
        duration_secs: f64,
    },
}

fn emit(event: &Event<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

fn emit_err(event: &Event<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        eprintln!("{json}");
    }
}
