//! `records` command

use clap::{Args, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use super::{print_json, CliError, OutputFormat};
use crate::api::{Api, Table, WriteOptions};
use crate::client::QueryOptions;
use crate::shutdown::SharedShutdown;
use crate::types::{Fields, RecordDict, UpsertRecord};

/// Records subcommand
#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// Base id (app...)
    #[arg(long)]
    pub base: String,

    /// Table name or id
    #[arg(long)]
    pub table: String,

    #[command(subcommand)]
    action: RecordsAction,
}

/// Records actions
#[derive(Debug, Subcommand)]
enum RecordsAction {
    /// List records page by page
    List(ListArgs),

    /// Fetch one record
    Get {
        /// Record id
        record_id: String,
    },

    /// Create one record from a JSON object of fields
    Create {
        /// Fields as JSON, e.g. '{"Name": "Alice"}'
        #[arg(long)]
        fields: String,

        /// Let the service coerce values
        #[arg(long, default_value_t = false)]
        typecast: bool,
    },

    /// Delete records by id
    Delete {
        /// Record ids
        #[arg(required = true)]
        record_ids: Vec<String>,
    },

    /// Create or update records matched on key fields
    Upsert {
        /// JSON array of records, each `{"fields": {...}}` with an optional "id"
        #[arg(long)]
        records: String,

        /// Field to match on; repeat for several
        #[arg(long = "key", required = true)]
        key_fields: Vec<String>,

        /// Clear fields that are not sent
        #[arg(long, default_value_t = false)]
        replace: bool,

        /// Let the service coerce values
        #[arg(long, default_value_t = false)]
        typecast: bool,
    },
}

/// Arguments for listing records
#[derive(Debug, Args)]
pub struct ListArgs {
    /// View name or id
    #[arg(long)]
    pub view: Option<String>,

    /// Formula records must match
    #[arg(long)]
    pub formula: Option<String>,

    /// Field to return; repeat for several
    #[arg(long = "field")]
    pub fields: Vec<String>,

    /// Field to sort by, prefix with '-' for descending; repeat for several
    #[arg(long)]
    pub sort: Vec<String>,

    /// Stop after this many records
    #[arg(long)]
    pub max_records: Option<u64>,

    /// Records per page (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: Option<u32>,

    /// Any other list option as name=value; values are parsed as JSON when possible
    #[arg(long = "option", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,
}

/// Split `name=value`, reading the value as JSON and falling back to a string
fn parse_option(input: &str) -> Result<(String, Value), String> {
    let (name, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("'{input}' is not in name=value form"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("'{input}' has an empty option name"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

impl ListArgs {
    /// Query options from the flags; `--option` entries go through
    /// [`QueryOptions::set`] and are validated before any request
    pub fn query_options(&self) -> Result<QueryOptions, CliError> {
        let mut options = QueryOptions::new()
            .with_fields(self.fields.iter().cloned())
            .with_sort(self.sort.iter().cloned());
        if let Some(view) = &self.view {
            options = options.with_view(view.clone());
        }
        if let Some(formula) = &self.formula {
            options = options.with_formula(formula.clone());
        }
        if let Some(max_records) = self.max_records {
            options = options.with_max_records(max_records);
        }
        if let Some(page_size) = self.page_size {
            options = options.with_page_size(page_size);
        }
        for (name, value) in &self.options {
            options.set(name, value.clone())?;
        }
        options.validate()?;
        Ok(options)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(flag: &str, input: &str) -> Result<T, CliError> {
    serde_json::from_str(input)
        .map_err(|e| CliError::InvalidArgument(format!("--{flag} is not valid JSON: {e}")))
}

fn print_record(record: &RecordDict) {
    let fields = serde_json::to_string(&record.fields).unwrap_or_default();
    println!("{} {}", record.id, fields);
}

impl RecordsCommand {
    /// Execute the records command
    pub async fn execute(
        &self,
        api: &Api,
        format: OutputFormat,
        shutdown: SharedShutdown,
    ) -> Result<(), CliError> {
        let table = api.table(self.base.clone(), self.table.clone());
        match &self.action {
            RecordsAction::List(args) => list(&table, args, format, shutdown).await,
            RecordsAction::Get { record_id } => {
                let record = table.get(record_id, QueryOptions::new()).await?;
                match format {
                    OutputFormat::Json => print_json(&record)?,
                    OutputFormat::Human => print_record(&record),
                }
                Ok(())
            }
            RecordsAction::Create { fields, typecast } => {
                let fields: Fields = parse_json("fields", fields)?;
                let record = table.create(fields, *typecast).await?;
                match format {
                    OutputFormat::Json => print_json(&record)?,
                    OutputFormat::Human => println!("Created {}", record.id),
                }
                Ok(())
            }
            RecordsAction::Delete { record_ids } => {
                let deleted = table.batch_delete(record_ids.clone()).await?;
                match format {
                    OutputFormat::Json => print_json(&deleted)?,
                    OutputFormat::Human => {
                        for record in &deleted {
                            println!("Deleted {}", record.id);
                        }
                    }
                }
                Ok(())
            }
            RecordsAction::Upsert {
                records,
                key_fields,
                replace,
                typecast,
            } => {
                let records: Vec<UpsertRecord> = parse_json("records", records)?;
                let options = WriteOptions::new().replace(*replace).typecast(*typecast);
                let result = table.batch_upsert(records, key_fields, options).await?;
                match format {
                    OutputFormat::Json => print_json(&result)?,
                    OutputFormat::Human => println!(
                        "Created {} and updated {} records",
                        result.created_records.len(),
                        result.updated_records.len()
                    ),
                }
                Ok(())
            }
        }
    }
}

async fn list(
    table: &Table<'_>,
    args: &ListArgs,
    format: OutputFormat,
    shutdown: SharedShutdown,
) -> Result<(), CliError> {
    let mut paginator = table.iterate(args.query_options()?);
    let mut collected = Vec::new();
    let mut total = 0usize;

    loop {
        let page = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                warn!(records = total, "Listing interrupted");
                break;
            }
            page = paginator.next_page() => page?,
        };
        let Some(page) = page else {
            break;
        };
        total += page.items.len();
        match format {
            OutputFormat::Json => collected.extend(page.items),
            OutputFormat::Human => page.items.iter().for_each(print_record),
        }
    }

    if format == OutputFormat::Json {
        print_json(&collected)?;
    }
    info!(
        table = table.name(),
        records = total,
        pages = paginator.pages_fetched(),
        "Listing finished"
    );
    Ok(())
}
