//! Ruleplug CLI - lint HCL infrastructure configuration with pluggable rulesets

use anyhow::Result;
use clap::Parser;
use ruleplug_cli::commands::{self, check::CheckExitCode};
use ruleplug_cli::{Cli, Commands};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("RULEPLUG_LOG", "warn"))
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Some(Commands::Init { ref path }) => {
            commands::init::run(path.as_deref())?;
            CheckExitCode::Success
        }
        Some(Commands::Rules { ref path }) => {
            commands::rules::run(path.as_deref(), &cli)?;
            CheckExitCode::Success
        }
        Some(Commands::Plugin) => {
            commands::plugin::run()?;
            CheckExitCode::Success
        }
        Some(Commands::Check { ref path }) => commands::check::run(path.as_deref(), &cli)?,
        // Default command is check with current directory
        None => commands::check::run(None, &cli)?,
    };

    Ok(match code {
        CheckExitCode::Success => ExitCode::SUCCESS,
        CheckExitCode::IssuesExceedThreshold => ExitCode::from(1),
    })
}
