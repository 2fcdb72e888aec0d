//! # airtable-kit
//!
//! Async client for the Airtable REST API with a typed ORM layer.
//!
//! ## Features
//!
//! - **Paginated reads**: cursor-following page streams with a client-side record cap
//! - **Batched writes**: create, update, delete and upsert in chunks of 10 records
//! - **Retries**: exponential backoff for 429/5xx responses and timeouts
//! - **Rate limiting**: request spacing shared by pagination and batch writes
//! - **ORM**: `const` field descriptors, dirty tracking, eager or lazy links
//!
//! ## Quick Start
//!
//! ```no_run
//! use airtable_kit::{Api, QueryOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Api::new("patXXXXXXXXXXXXXX")?;
//! let table = api.table("appXXXXXXXXXXXXXX", "Tasks");
//!
//! let open = table
//!     .all(QueryOptions::new().with_formula("NOT({Done})").with_sort(["-Priority"]))
//!     .await?;
//! println!("{} open tasks", open.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - transport, retry policy, rate limiter, executor, paginator, batch writes
//! - [`api`] - the [`Api`] handle and its per-table facade
//! - [`orm`] - models and field descriptors
//! - [`formulas`] - formula string helpers
//! - [`types`] - wire types shared by all layers
//! - [`testing`] - scripted transport for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

/// API handle and table facade
pub mod api;

/// CLI command implementations
pub mod cli;

/// HTTP plumbing: transport, retries, rate limiting, pagination, batching
pub mod client;

/// Formula building helpers
pub mod formulas;

/// Prometheus metrics
pub mod metrics;

/// Typed models
pub mod orm;

/// Ctrl+C handling
pub mod shutdown;

/// Scripted transport for tests
pub mod testing;

/// Wire types
pub mod types;

pub use api::{Api, ApiConfig, Table, WriteOptions};
pub use client::{ApiError, ApiResult, QueryOptions, RateLimiter, RetryPolicy};
pub use types::{
    Comment, DeletedRecord, Fields, RecordDict, UpdateRecord, UpsertRecord, UpsertResult,
};
