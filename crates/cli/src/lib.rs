//! Ruleplug CLI library, exposed for integration tests

pub mod commands;
pub mod discovery;
pub mod output;
pub mod plugins;
pub mod rules;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ruleplug")]
#[command(about = "Rule-based linting for HCL infrastructure configuration", long_about = None)]
#[command(version = ruleplug::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Severity threshold for non-zero exit: error, warning, notice, never
    #[arg(long, global = true)]
    pub fail_on: Option<String>,

    /// Write fixes back to the files
    #[arg(long, global = true)]
    pub fix: bool,

    /// Run only these rules
    #[arg(long, value_delimiter = ',', global = true)]
    pub only: Option<Vec<String>>,

    /// Inspect every directory below the path as its own module
    #[arg(long, global = true)]
    pub recursive: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize .ruleplug.toml configuration
    Init {
        /// Path to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Check a module (default command)
    Check {
        /// Module directory (default: current directory)
        path: Option<PathBuf>,
    },

    /// List the rules of every configured ruleset
    Rules {
        /// Directory to load configuration from (default: current directory)
        path: Option<PathBuf>,
    },

    /// Serve the built-in ruleset over stdin/stdout
    #[command(hide = true)]
    Plugin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}
