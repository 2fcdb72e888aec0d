//! Record operations on one table

use serde_json::json;
use tracing::{debug, info, instrument};

use super::Api;
use crate::client::{decode, ApiError, ApiRequest, ApiResult, Paginator, QueryOptions};
use crate::metrics;
use crate::types::{
    Comment, DeletedRecord, Fields, RecordDict, UpdateRecord, UpsertRecord, UpsertResult,
};

/// Options for single and batch writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// PUT instead of PATCH: fields not sent are cleared
    pub replace: bool,
    /// Let the service coerce values (e.g. create missing select options)
    pub typecast: bool,
}

impl WriteOptions {
    /// PATCH without typecasting
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `replace`
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Set `typecast`
    pub fn typecast(mut self, typecast: bool) -> Self {
        self.typecast = typecast;
        self
    }
}

/// Handle for one table of a base
#[derive(Debug, Clone)]
pub struct Table<'a> {
    api: &'a Api,
    base_id: String,
    name: String,
}

impl<'a> Table<'a> {
    pub(crate) fn new(api: &'a Api, base_id: String, name: String) -> Self {
        Self { api, base_id, name }
    }

    /// Base id
    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    /// Table name or id
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The API handle this table belongs to
    pub fn api(&self) -> &'a Api {
        self.api
    }

    /// URL of the table's records endpoint
    pub fn url(&self) -> String {
        self.api.urls().table(&self.base_id, &self.name)
    }

    /// URL of one record
    pub fn record_url(&self, record_id: &str) -> String {
        self.api.urls().record(&self.base_id, &self.name, record_id)
    }

    /// Fetch one record by id
    #[instrument(skip(self, options), fields(table = %self.name))]
    pub async fn get(&self, record_id: &str, options: QueryOptions) -> ApiResult<RecordDict> {
        let request = ApiRequest::get(self.record_url(record_id)).with_options(options);
        decode(self.api.executor().execute(request).await?)
    }

    /// Page through records matching `options`
    pub fn iterate(&self, options: QueryOptions) -> Paginator<RecordDict> {
        Paginator::new(
            self.api.executor().clone(),
            self.api.limiter().clone(),
            self.url(),
            options,
        )
        .with_fallback(self.api.urls().list_records_post(&self.base_id, &self.name))
    }

    /// All records matching `options`
    pub async fn all(&self, options: QueryOptions) -> ApiResult<Vec<RecordDict>> {
        let records = self.iterate(options).collect_all().await?;
        debug!(table = %self.name, records = records.len(), "Fetched all records");
        Ok(records)
    }

    /// First record matching `options`, if any
    pub async fn first(&self, options: QueryOptions) -> ApiResult<Option<RecordDict>> {
        let options = options.with_max_records(1).with_page_size(1);
        let mut paginator = self.iterate(options);
        Ok(paginator
            .next_page()
            .await?
            .and_then(|page| page.items.into_iter().next()))
    }

    /// Create one record
    pub async fn create(&self, fields: Fields, typecast: bool) -> ApiResult<RecordDict> {
        let body = json!({ "fields": fields, "typecast": typecast });
        let record: RecordDict = decode(
            self.api
                .executor()
                .execute(ApiRequest::post(self.url(), body))
                .await?,
        )?;
        metrics::record_records_written("create", 1);
        info!(table = %self.name, record_id = %record.id, "Created record");
        Ok(record)
    }

    /// Update one record
    pub async fn update(
        &self,
        record_id: &str,
        fields: Fields,
        options: WriteOptions,
    ) -> ApiResult<RecordDict> {
        let body = json!({ "fields": fields, "typecast": options.typecast });
        let url = self.record_url(record_id);
        let request = if options.replace {
            ApiRequest::put(url, body)
        } else {
            ApiRequest::patch(url, body)
        };
        let record: RecordDict = decode(self.api.executor().execute(request).await?)?;
        metrics::record_records_written("update", 1);
        debug!(table = %self.name, record_id, "Updated record");
        Ok(record)
    }

    /// Delete one record
    pub async fn delete(&self, record_id: &str) -> ApiResult<DeletedRecord> {
        let response = self
            .api
            .executor()
            .execute(ApiRequest::delete(self.record_url(record_id)))
            .await?;
        let deleted: DeletedRecord = decode(response)?;
        metrics::record_records_written("delete", 1);
        info!(table = %self.name, record_id, "Deleted record");
        Ok(deleted)
    }

    /// Create records in chunks
    pub async fn batch_create(&self, records: Vec<Fields>, typecast: bool) -> ApiResult<Vec<RecordDict>> {
        self.api.batcher().batch_create(&self.url(), records, typecast).await
    }

    /// Update records in chunks
    pub async fn batch_update(
        &self,
        records: Vec<UpdateRecord>,
        options: WriteOptions,
    ) -> ApiResult<Vec<RecordDict>> {
        self.api
            .batcher()
            .batch_update(&self.url(), records, options.replace, options.typecast)
            .await
    }

    /// Delete records in chunks
    pub async fn batch_delete(&self, record_ids: Vec<String>) -> ApiResult<Vec<DeletedRecord>> {
        self.api.batcher().batch_delete(&self.url(), record_ids).await
    }

    /// Create or update records, matching on `key_fields`
    pub async fn batch_upsert(
        &self,
        records: Vec<UpsertRecord>,
        key_fields: &[String],
        options: WriteOptions,
    ) -> ApiResult<UpsertResult> {
        self.api
            .batcher()
            .batch_upsert(&self.url(), records, key_fields, options.replace, options.typecast)
            .await
    }

    /// All comments on a record, oldest page first
    pub async fn comments(&self, record_id: &str) -> ApiResult<Vec<Comment>> {
        let url = self.api.urls().comments(&self.base_id, &self.name, record_id);
        Paginator::<Comment>::new(
            self.api.executor().clone(),
            self.api.limiter().clone(),
            url,
            QueryOptions::default(),
        )
        .with_items_key("comments")
        .collect_all()
        .await
    }

    /// Add a comment to a record
    pub async fn add_comment(&self, record_id: &str, text: &str) -> ApiResult<Comment> {
        let url = self.api.urls().comments(&self.base_id, &self.name, record_id);
        let response = self
            .api
            .executor()
            .execute(ApiRequest::post(url, json!({ "text": text })))
            .await?;
        decode(response)
    }

    /// Replace the text of an existing comment
    pub async fn update_comment(
        &self,
        record_id: &str,
        comment_id: &str,
        text: &str,
    ) -> ApiResult<Comment> {
        let url = self
            .api
            .urls()
            .comment(&self.base_id, &self.name, record_id, comment_id);
        let response = self
            .api
            .executor()
            .execute(ApiRequest::patch(url, json!({ "text": text })))
            .await?;
        decode(response)
    }

    /// Delete a comment
    pub async fn delete_comment(&self, record_id: &str, comment_id: &str) -> ApiResult<bool> {
        let url = self
            .api
            .urls()
            .comment(&self.base_id, &self.name, record_id, comment_id);
        let response = self.api.executor().execute(ApiRequest::delete(url)).await?;
        response
            .get("deleted")
            .and_then(|deleted| deleted.as_bool())
            .ok_or_else(|| ApiError::InvalidResponse("comment delete response has no 'deleted' flag".into()))
    }
}
