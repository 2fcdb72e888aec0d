//! Query options and their wire translation
//!
//! The same options are rendered two ways:
//! - as GET query parameters (`fields[]`, `sort[0][field]`, `returnFieldsByFieldId=1`)
//! - as a POST body for the `listRecords` fallback (`fields: [...]`,
//!   `sort: [{field, direction}]`, `returnFieldsByFieldId: true`)
//!
//! `timeZone` and `userLocale` are only accepted in the query string, so they
//! stay there in both renderings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::config::MAX_PAGE_SIZE;
use super::{ApiError, ApiResult};

/// Parameters the service only accepts in the query string
pub const GET_ONLY_PARAMS: [&str; 2] = ["timeZone", "userLocale"];

/// Recognized options for list and get calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// View name or id
    pub view: Option<String>,
    /// Total records to return across all pages
    pub max_records: Option<u64>,
    /// Records per page (1..=100)
    pub page_size: Option<u32>,
    /// Pagination cursor
    pub offset: Option<String>,
    /// `filterByFormula`
    pub formula: Option<String>,
    /// Fields to return
    pub fields: Vec<String>,
    /// Sort fields; a leading `-` means descending
    pub sort: Vec<String>,
    /// `json` or `string`
    pub cell_format: Option<String>,
    /// Time zone for `cellFormat=string`
    pub time_zone: Option<String>,
    /// Locale for `cellFormat=string`
    pub user_locale: Option<String>,
    /// Key returned fields by field id instead of name
    pub return_fields_by_field_id: Option<bool>,
}

impl QueryOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `view`
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Set `maxRecords`
    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// Set `pageSize`
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set `filterByFormula`
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Set the returned fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sort order; prefix a field with `-` for descending
    pub fn with_sort<I, S>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    /// Set `cellFormat`
    pub fn with_cell_format(mut self, cell_format: impl Into<String>) -> Self {
        self.cell_format = Some(cell_format.into());
        self
    }

    /// Set `timeZone`
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    /// Set `userLocale`
    pub fn with_user_locale(mut self, user_locale: impl Into<String>) -> Self {
        self.user_locale = Some(user_locale.into());
        self
    }

    /// Set `returnFieldsByFieldId`
    pub fn with_return_fields_by_field_id(mut self, enabled: bool) -> Self {
        self.return_fields_by_field_id = Some(enabled);
        self
    }

    /// Set an option by name from a loosely typed value.
    ///
    /// Accepts both the snake_case option names and the service's camelCase
    /// parameter names. Unknown names are rejected with
    /// [`ApiError::InvalidParameter`].
    pub fn set(&mut self, name: &str, value: Value) -> ApiResult<()> {
        match name {
            "view" => self.view = Some(expect_string(name, value)?),
            "max_records" | "maxRecords" => self.max_records = Some(expect_u64(name, &value)?),
            "page_size" | "pageSize" => {
                let page_size = expect_u64(name, &value)?;
                self.page_size = Some(u32::try_from(page_size).map_err(|_| {
                    ApiError::InvalidParameter(format!("{name} out of range: {page_size}"))
                })?);
            }
            "offset" => self.offset = Some(expect_string(name, value)?),
            "formula" | "filterByFormula" => self.formula = Some(expect_string(name, value)?),
            "fields" => self.fields = expect_string_list(name, value)?,
            "sort" => self.sort = expect_string_list(name, value)?,
            "cell_format" | "cellFormat" => self.cell_format = Some(expect_string(name, value)?),
            "time_zone" | "timeZone" => self.time_zone = Some(expect_string(name, value)?),
            "user_locale" | "userLocale" => self.user_locale = Some(expect_string(name, value)?),
            "return_fields_by_field_id" | "returnFieldsByFieldId" => {
                self.return_fields_by_field_id = Some(value.as_bool().ok_or_else(|| {
                    ApiError::InvalidParameter(format!("{name} expects a boolean"))
                })?)
            }
            _ => {
                return Err(ApiError::InvalidParameter(format!(
                    "'{name}' is not a supported parameter"
                )))
            }
        }
        Ok(())
    }

    /// Check value ranges before anything is sent
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(page_size) = self.page_size {
            if page_size == 0 || page_size > MAX_PAGE_SIZE {
                return Err(ApiError::InvalidParameter(format!(
                    "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
                )));
            }
        }
        if let Some(cell_format) = &self.cell_format {
            if cell_format != "json" && cell_format != "string" {
                return Err(ApiError::InvalidParameter(format!(
                    "cell_format must be 'json' or 'string', got '{cell_format}'"
                )));
            }
        }
        if self.sort.iter().any(|s| s.trim_start_matches('-').is_empty()) {
            return Err(ApiError::InvalidParameter("sort field names cannot be empty".into()));
        }
        Ok(())
    }

    /// Render as GET query parameters
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push = |key: &str, value: String| params.push((key.to_string(), value));

        if let Some(view) = &self.view {
            push("view", view.clone());
        }
        if let Some(max_records) = self.max_records {
            push("maxRecords", max_records.to_string());
        }
        if let Some(page_size) = self.page_size {
            push("pageSize", page_size.to_string());
        }
        if let Some(offset) = &self.offset {
            push("offset", offset.clone());
        }
        if let Some(formula) = &self.formula {
            push("filterByFormula", formula.clone());
        }
        for field in &self.fields {
            push("fields[]", field.clone());
        }
        for (index, sort) in self.sort.iter().enumerate() {
            let (field, direction) = split_sort(sort);
            push(&format!("sort[{index}][field]"), field.to_string());
            push(&format!("sort[{index}][direction]"), direction.to_string());
        }
        if let Some(cell_format) = &self.cell_format {
            push("cellFormat", cell_format.clone());
        }
        if let Some(time_zone) = &self.time_zone {
            push("timeZone", time_zone.clone());
        }
        if let Some(user_locale) = &self.user_locale {
            push("userLocale", user_locale.clone());
        }
        if let Some(by_id) = self.return_fields_by_field_id {
            push("returnFieldsByFieldId", if by_id { "1" } else { "0" }.to_string());
        }
        params
    }

    /// Render as a POST body, leaving out the query-only parameters
    pub fn to_post_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(view) = &self.view {
            body.insert("view".into(), json!(view));
        }
        if let Some(max_records) = self.max_records {
            body.insert("maxRecords".into(), json!(max_records));
        }
        if let Some(page_size) = self.page_size {
            body.insert("pageSize".into(), json!(page_size));
        }
        if let Some(offset) = &self.offset {
            body.insert("offset".into(), json!(offset));
        }
        if let Some(formula) = &self.formula {
            body.insert("filterByFormula".into(), json!(formula));
        }
        if !self.fields.is_empty() {
            body.insert("fields".into(), json!(self.fields));
        }
        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|s| {
                    let (field, direction) = split_sort(s);
                    json!({ "field": field, "direction": direction })
                })
                .collect();
            body.insert("sort".into(), Value::Array(sort));
        }
        if let Some(cell_format) = &self.cell_format {
            body.insert("cellFormat".into(), json!(cell_format));
        }
        if let Some(by_id) = self.return_fields_by_field_id {
            body.insert("returnFieldsByFieldId".into(), json!(by_id));
        }
        body
    }

    /// Query-only parameters, which stay in the URL when falling back to POST
    pub fn get_only_params(&self) -> Vec<(String, String)> {
        self.to_query_params()
            .into_iter()
            .filter(|(key, _)| GET_ONLY_PARAMS.contains(&key.as_str()))
            .collect()
    }
}

fn split_sort(sort: &str) -> (&str, &str) {
    match sort.strip_prefix('-') {
        Some(field) => (field, "desc"),
        None => (sort, "asc"),
    }
}

fn expect_string(name: &str, value: Value) -> ApiResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ApiError::InvalidParameter(format!(
            "{name} expects a string, got {other}"
        ))),
    }
}

fn expect_u64(name: &str, value: &Value) -> ApiResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| ApiError::InvalidParameter(format!("{name} expects a positive integer, got {value}")))
}

fn expect_string_list(name: &str, value: Value) -> ApiResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| expect_string(name, item))
            .collect(),
        other => Err(ApiError::InvalidParameter(format!(
            "{name} expects a string or a list of strings, got {other}"
        ))),
    }
}
