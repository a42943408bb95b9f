//! # CLI Support
//!
//! Command line for running the contract suite in CI pipelines.
//! Credentials are never flags; they come from the environment or the
//! config file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::environment::Overrides;

/// CLI configuration parsed from command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "blueview-contract",
    version,
    about = "Run HTTP contract checks against the Blueview API"
)]
pub struct CliConfig {
    /// TOML settings file. Defaults to `contract.toml` when present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base URL of the service under test; overrides BLUEVIEW_BASE_URL.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Only run cases whose name contains this text.
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the JSON report to this file.
    #[arg(long = "report", value_name = "PATH")]
    pub report_path: Option<PathBuf>,

    /// Treat skipped cases as failures.
    #[arg(long)]
    pub fail_on_skip: bool,

    /// Print every case, not only the ones that did not pass.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliConfig {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Output format for CLI reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
