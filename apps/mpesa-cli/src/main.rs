//! `mpesa-cli`: drive the gateway client from a shell.
//!
//! ```bash
//! mpesa-cli --config mpesa.yaml token
//! mpesa-cli stk-push --payload stk.json
//! mpesa-cli register-url --api-key ops-user --payload register.json
//! mpesa-cli -v b2c --payload b2c.json
//! mpesa-cli check
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use mpesa_sdk::MpesaError;
use mpesa_sdk::telemetry::init_logging;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "mpesa-cli")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// YAML settings file; environment variables still take precedence
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn log_level_override(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = mpesa_sdk::Settings::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level_override() {
        level.clone_into(&mut settings.log_level);
    }
    let _guard = init_logging(&settings.logging())?;

    let output = cli.command.run(&settings).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<MpesaError>() {
        Some(mpesa) => {
            eprintln!("error kind: {}", mpesa.kind());
            eprintln!("message:    {mpesa}");
            eprintln!("mitigation: {}", mpesa.mitigation());
            if let MpesaError::Validation(validation) = mpesa {
                for violation in validation.violations() {
                    eprintln!("  - {}: {}", violation.field, violation.message);
                }
            }
        }
        None => eprintln!("error: {err:#}"),
    }
}
