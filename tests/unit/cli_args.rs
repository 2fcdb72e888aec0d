//! Unit tests for CLI argument parsing

use airtable_kit::cli::{Cli, Commands, OutputFormat};
use clap::Parser;

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["airtable-kit", "whoami"]);
    assert_eq!(cli.max_retries, 5, "Default max_retries should be 5");
    assert_eq!(cli.requests_per_second, 5);
    assert_eq!(cli.timeout, 30);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(cli.metrics_addr.is_none());

    // 5 retries after the first attempt
    assert_eq!(cli.api_config().retry.max_attempts, 6);
}

#[test]
fn test_cli_respects_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "airtable-kit",
        "records",
        "--base",
        "appX",
        "--table",
        "Tasks",
        "list",
        "--max-records",
        "25",
        "--max-retries",
        "10",
        "--output-format",
        "json",
    ]);
    assert_eq!(cli.max_retries, 10);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert!(matches!(cli.command, Commands::Records(_)));
}

#[test]
fn test_cli_rejects_out_of_range_values() {
    assert!(Cli::try_parse_from(["airtable-kit", "--max-retries", "21", "whoami"]).is_err());
    assert!(Cli::try_parse_from(["airtable-kit", "--timeout", "0", "whoami"]).is_err());
    assert!(Cli::try_parse_from([
        "airtable-kit",
        "records",
        "--base",
        "appX",
        "--table",
        "Tasks",
        "list",
        "--page-size",
        "101",
    ])
    .is_err());
}

#[test]
fn test_cli_parses_metrics_addr() {
    let cli = Cli::parse_from(["airtable-kit", "--metrics-addr", "127.0.0.1:9000", "whoami"]);
    assert_eq!(cli.metrics_addr.unwrap().port(), 9000);
}

#[test]
fn test_upsert_requires_key() {
    let result = Cli::try_parse_from([
        "airtable-kit",
        "records",
        "--base",
        "appX",
        "--table",
        "Tasks",
        "upsert",
        "--records",
        "[]",
    ]);
    assert!(result.is_err());
}
