//! Formula building helpers
//!
//! Produces strings for the `filterByFormula` option. Only the pieces the
//! client needs are covered: literals, field references, `AND`/`OR`,
//! `RECORD_ID()` matching and field equality.

use serde_json::Value;

use crate::client::{ApiError, ApiResult};
use crate::types::Fields;

/// Wrap text in single quotes, escaping backslashes and quotes
pub fn quoted(value: &str) -> String {
    format!("'{}'", escape_quotes(value))
}

/// Escape backslashes and single quotes for use inside a quoted literal
pub fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Reference a field by name: `{Field Name}`
pub fn field_name(name: &str) -> String {
    format!("{{{}}}", name.replace('}', "\\}"))
}

/// Render a JSON value as a formula literal
pub fn to_formula_str(value: &Value) -> ApiResult<String> {
    match value {
        Value::Null => Ok("BLANK()".to_string()),
        Value::Bool(true) => Ok("TRUE()".to_string()),
        Value::Bool(false) => Ok("FALSE()".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(quoted(s)),
        Value::Array(_) | Value::Object(_) => Err(ApiError::InvalidParameter(format!(
            "cannot use {value} in a formula"
        ))),
    }
}

fn compound(operator: &str, components: &[String]) -> String {
    format!("{operator}({})", components.join(", "))
}

/// `AND(a, b, ...)`
pub fn and(components: &[String]) -> String {
    compound("AND", components)
}

/// `OR(a, b, ...)`
pub fn or(components: &[String]) -> String {
    compound("OR", components)
}

/// Formula matching any of `record_ids`
pub fn record_id_in<S: AsRef<str>>(record_ids: &[S]) -> String {
    let clauses: Vec<String> = record_ids
        .iter()
        .map(|id| format!("RECORD_ID()={}", quoted(id.as_ref())))
        .collect();
    match clauses.as_slice() {
        [single] => single.clone(),
        _ => or(&clauses),
    }
}

/// Equality formula over `fields`; all must match unless `match_any` is set
pub fn match_fields(fields: &Fields, match_any: bool) -> ApiResult<String> {
    let expressions = fields
        .iter()
        .map(|(name, value)| Ok(format!("{}={}", field_name(name), to_formula_str(value)?)))
        .collect::<ApiResult<Vec<String>>>()?;
    match expressions.as_slice() {
        [] => Err(ApiError::InvalidParameter(
            "match_fields requires at least one field".to_string(),
        )),
        [single] => Ok(single.clone()),
        _ if match_any => Ok(or(&expressions)),
        _ => Ok(and(&expressions)),
    }
}
