//! CLI command implementations

pub mod comments;
pub mod error;
pub mod records;
pub mod whoami;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::api::{Api, ApiConfig};
use crate::client::{RetryPolicy, Timeouts};

pub use comments::CommentsCommand;
pub use error::CliError;
pub use records::RecordsCommand;

/// Airtable command line client
#[derive(Parser, Debug)]
#[command(name = "airtable-kit")]
#[command(about = "Read and write Airtable records from the command line", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Personal access token
    #[arg(long, global = true, env = "AIRTABLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Retries after the first attempt for 429/5xx responses and timeouts
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Spacing for pages and batch chunks; 0 disables limiting
    #[arg(long, global = true, default_value = "5")]
    pub requests_per_second: u32,

    /// Per-request read timeout in seconds
    #[arg(long, global = true, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the user and scopes behind the token
    Whoami,

    /// List, read and write records
    Records(RecordsCommand),

    /// Read and add record comments
    Comments(CommentsCommand),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// API settings from the global flags
    pub fn api_config(&self) -> ApiConfig {
        let timeouts = Timeouts {
            read: Duration::from_secs(self.timeout),
            ..Timeouts::default()
        };
        ApiConfig::default()
            .with_timeouts(timeouts)
            .with_retry(RetryPolicy::default().with_max_attempts(self.max_retries + 1))
            .with_requests_per_second(self.requests_per_second)
    }

    /// Build the API handle, failing early without a token
    pub fn connect(&self) -> Result<Api, CliError> {
        let token = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(CliError::MissingApiKey)?;
        Ok(Api::with_config(token, self.api_config())?)
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
