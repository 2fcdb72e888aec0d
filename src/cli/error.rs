//! CLI error types and conversions

use crate::client::ApiError;
use crate::metrics::MetricsError;
use crate::orm::OrmError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Request failed
    #[error("api error: {0}")]
    ApiError(#[from] ApiError),

    /// Model operation failed
    #[error("orm error: {0}")]
    OrmError(#[from] OrmError),

    /// Metrics exporter failed to start
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Output could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// No token given
    #[error("no API key: pass --api-key or set AIRTABLE_API_KEY")]
    MissingApiKey,

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
