//! Chunked batch writes
//!
//! The service accepts at most ten records per write. [`BatchCoordinator`]
//! splits larger inputs into chunks, sends them sequentially with the rate
//! limiter between chunks, and concatenates the results in input order.
//!
//! If the first chunk fails its error is returned unchanged. A failure on a
//! later chunk is wrapped in [`ApiError::PartialBatch`] so callers know some
//! records were already written.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::config::MAX_RECORDS_PER_REQUEST;
use super::executor::{ApiRequest, RequestExecutor};
use super::rate_limit::RateLimiter;
use super::{decode, ApiError, ApiResult};
use crate::metrics;
use crate::types::{DeletedRecord, Fields, RecordDict, UpdateRecord, UpsertRecord, UpsertResult};

/// Splits writes into chunks and sends them in order
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    executor: Arc<RequestExecutor>,
    limiter: Arc<RateLimiter>,
    chunk_size: usize,
}

impl BatchCoordinator {
    /// Coordinator sending at most ten records per request
    pub fn new(executor: Arc<RequestExecutor>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            executor,
            limiter,
            chunk_size: MAX_RECORDS_PER_REQUEST,
        }
    }

    /// Override the chunk size (minimum 1)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Records per request
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// POST new records to `table_url`
    pub async fn batch_create(
        &self,
        table_url: &str,
        records: Vec<Fields>,
        typecast: bool,
    ) -> ApiResult<Vec<RecordDict>> {
        let executor = &*self.executor;
        let chunks = self
            .run_chunks("create", records, move |chunk| async move {
                let records: Vec<Value> = chunk
                    .into_iter()
                    .map(|fields| json!({ "fields": fields }))
                    .collect();
                let body = json!({ "records": records, "typecast": typecast });
                let response = executor.execute(ApiRequest::post(table_url, body)).await?;
                records_from::<RecordDict>(response)
            })
            .await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    /// PATCH (or PUT when `replace`) existing records at `table_url`
    pub async fn batch_update(
        &self,
        table_url: &str,
        records: Vec<UpdateRecord>,
        replace: bool,
        typecast: bool,
    ) -> ApiResult<Vec<RecordDict>> {
        let executor = &*self.executor;
        let chunks = self
            .run_chunks("update", records, move |chunk| async move {
                let body = json!({ "records": chunk, "typecast": typecast });
                let request = if replace {
                    ApiRequest::put(table_url, body)
                } else {
                    ApiRequest::patch(table_url, body)
                };
                records_from::<RecordDict>(executor.execute(request).await?)
            })
            .await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    /// DELETE records by id
    pub async fn batch_delete(
        &self,
        table_url: &str,
        record_ids: Vec<String>,
    ) -> ApiResult<Vec<DeletedRecord>> {
        let executor = &*self.executor;
        let chunks = self
            .run_chunks("delete", record_ids, move |chunk| async move {
                let params = chunk
                    .into_iter()
                    .map(|id| ("records[]".to_string(), id))
                    .collect();
                let response = executor
                    .execute(ApiRequest::delete(table_url).with_params(params))
                    .await?;
                records_from::<DeletedRecord>(response)
            })
            .await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    /// Create or update records, matching on `key_fields` for records without an id.
    ///
    /// Every record without an id must carry a non-empty value for every key
    /// field; otherwise nothing is sent and [`ApiError::InvalidParameter`] is returned.
    pub async fn batch_upsert(
        &self,
        table_url: &str,
        records: Vec<UpsertRecord>,
        key_fields: &[String],
        replace: bool,
        typecast: bool,
    ) -> ApiResult<UpsertResult> {
        validate_upsert(&records, key_fields)?;

        let executor = &*self.executor;
        let chunks = self
            .run_chunks("upsert", records, move |chunk| async move {
                let body = json!({
                    "records": chunk,
                    "typecast": typecast,
                    "performUpsert": { "fieldsToMergeOn": key_fields },
                });
                let request = if replace {
                    ApiRequest::put(table_url, body)
                } else {
                    ApiRequest::patch(table_url, body)
                };
                let response = executor.execute(request).await?;
                let result: UpsertResult = decode(response)?;
                Ok(result)
            })
            .await?;

        let mut result = UpsertResult::default();
        for chunk in chunks {
            result.extend(chunk);
        }
        info!(
            created = result.created_records.len(),
            updated = result.updated_records.len(),
            "Upsert complete"
        );
        Ok(result)
    }

    async fn run_chunks<I, O, F, Fut>(
        &self,
        operation: &'static str,
        items: Vec<I>,
        mut send_chunk: F,
    ) -> ApiResult<Vec<O>>
    where
        F: FnMut(Vec<I>) -> Fut,
        Fut: Future<Output = ApiResult<O>>,
    {
        let chunks = into_chunks(items, self.chunk_size);
        let total_chunks = chunks.len();
        let mut results = Vec::with_capacity(total_chunks);
        let mut completed_records = 0;

        for (index, chunk) in chunks.into_iter().enumerate() {
            if index > 0 {
                self.limiter.wait().await;
            }
            let chunk_len = chunk.len();
            debug!(
                operation,
                chunk = index + 1,
                total_chunks,
                records = chunk_len,
                "Sending chunk"
            );

            let outcome = send_chunk(chunk).await;
            self.limiter.mark().await;
            match outcome {
                Ok(output) => {
                    completed_records += chunk_len;
                    metrics::record_records_written(operation, chunk_len);
                    results.push(output);
                }
                Err(source) if index == 0 => return Err(source),
                Err(source) => {
                    return Err(ApiError::PartialBatch {
                        completed_chunks: index,
                        completed_records,
                        total_chunks,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(results)
    }
}

fn into_chunks<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(chunk_size).collect());
    }
    chunks
}

fn validate_upsert(records: &[UpsertRecord], key_fields: &[String]) -> ApiResult<()> {
    if key_fields.is_empty() {
        return Err(ApiError::InvalidParameter(
            "upsert requires at least one key field".into(),
        ));
    }
    for (index, record) in records.iter().enumerate() {
        if record.id.is_some() {
            continue;
        }
        let missing: Vec<&str> = key_fields
            .iter()
            .filter(|key| record.fields.get(key.as_str()).map_or(true, is_blank))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::InvalidParameter(format!(
                "record at index {index} is missing values for key fields: {}",
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn records_from<T: DeserializeOwned>(response: Value) -> ApiResult<Vec<T>> {
    let records = response
        .get("records")
        .cloned()
        .ok_or_else(|| ApiError::InvalidResponse("response has no 'records' key".into()))?;
    decode(records)
}
