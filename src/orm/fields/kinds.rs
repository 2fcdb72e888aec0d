//! Field kinds and their wire conversions

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number as JsonNumber, Value};
use std::str::FromStr;

use super::FieldKind;
use crate::types::{Attachment, Barcode, Button, Collaborator};

/// Wire format for datetimes written by this crate
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Wire format for dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn from_json<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Parse an ISO-8601 timestamp into UTC
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid datetime '{value}': {e}"))
}

/// Format a UTC timestamp the way the service does
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Any JSON value, passed through unchanged
#[derive(Debug, Clone, Copy)]
pub struct Any;

impl FieldKind for Any {
    type Value = Value;
    type Output = Option<Value>;
    const TYPE_NAME: &'static str = "any";

    fn to_internal_value(value: &Value) -> Result<Value, String> {
        Ok(value.clone())
    }

    fn to_record_value(value: &Value) -> Value {
        value.clone()
    }

    fn output(value: Option<Value>) -> Option<Value> {
        value
    }
}

/// Text; reads of a missing value return `""`
#[derive(Debug, Clone, Copy)]
pub struct Text;

impl FieldKind for Text {
    type Value = String;
    type Output = String;
    const TYPE_NAME: &'static str = "text";

    fn to_internal_value(value: &Value) -> Result<String, String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "expected a string".to_string())
    }

    fn to_record_value(value: &String) -> Value {
        Value::String(value.clone())
    }

    fn output(value: Option<String>) -> String {
        value.unwrap_or_default()
    }

    fn is_empty(value: &String) -> bool {
        value.is_empty()
    }
}

/// Whole number
#[derive(Debug, Clone, Copy)]
pub struct Integer;

impl FieldKind for Integer {
    type Value = i64;
    type Output = Option<i64>;
    const TYPE_NAME: &'static str = "integer";

    fn to_internal_value(value: &Value) -> Result<i64, String> {
        if let Some(n) = value.as_i64() {
            return Ok(n);
        }
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err("expected an integer".to_string()),
        }
    }

    fn to_record_value(value: &i64) -> Value {
        Value::from(*value)
    }

    fn output(value: Option<i64>) -> Option<i64> {
        value
    }
}

/// Floating point number
#[derive(Debug, Clone, Copy)]
pub struct Float;

impl FieldKind for Float {
    type Value = f64;
    type Output = Option<f64>;
    const TYPE_NAME: &'static str = "float";

    fn to_internal_value(value: &Value) -> Result<f64, String> {
        value.as_f64().ok_or_else(|| "expected a number".to_string())
    }

    fn to_record_value(value: &f64) -> Value {
        JsonNumber::from_f64(*value).map_or(Value::Null, Value::Number)
    }

    fn output(value: Option<f64>) -> Option<f64> {
        value
    }

    fn validate(value: &f64) -> Result<(), String> {
        if value.is_finite() {
            Ok(())
        } else {
            Err("number must be finite".to_string())
        }
    }
}

/// Number keeping its integer or float representation
#[derive(Debug, Clone, Copy)]
pub struct Number;

impl FieldKind for Number {
    type Value = JsonNumber;
    type Output = Option<JsonNumber>;
    const TYPE_NAME: &'static str = "number";

    fn to_internal_value(value: &Value) -> Result<JsonNumber, String> {
        match value {
            Value::Number(n) => Ok(n.clone()),
            _ => Err("expected a number".to_string()),
        }
    }

    fn to_record_value(value: &JsonNumber) -> Value {
        Value::Number(value.clone())
    }

    fn output(value: Option<JsonNumber>) -> Option<JsonNumber> {
        value
    }
}

/// Percentage stored as a fraction (0.5 is 50%)
#[derive(Debug, Clone, Copy)]
pub struct Percent;

impl FieldKind for Percent {
    type Value = JsonNumber;
    type Output = Option<JsonNumber>;
    const TYPE_NAME: &'static str = "percent";

    fn to_internal_value(value: &Value) -> Result<JsonNumber, String> {
        Number::to_internal_value(value)
    }

    fn to_record_value(value: &JsonNumber) -> Value {
        Number::to_record_value(value)
    }

    fn output(value: Option<JsonNumber>) -> Option<JsonNumber> {
        value
    }
}

/// Star rating, 1 and up
#[derive(Debug, Clone, Copy)]
pub struct Rating;

impl FieldKind for Rating {
    type Value = i64;
    type Output = Option<i64>;
    const TYPE_NAME: &'static str = "rating";

    fn to_internal_value(value: &Value) -> Result<i64, String> {
        Integer::to_internal_value(value)
    }

    fn to_record_value(value: &i64) -> Value {
        Integer::to_record_value(value)
    }

    fn output(value: Option<i64>) -> Option<i64> {
        value
    }

    fn validate(value: &i64) -> Result<(), String> {
        if *value >= 1 {
            Ok(())
        } else {
            Err(format!("rating must be 1 or greater, got {value}"))
        }
    }
}

/// Currency amount as an exact decimal
#[derive(Debug, Clone, Copy)]
pub struct Currency;

impl FieldKind for Currency {
    type Value = Decimal;
    type Output = Option<Decimal>;
    const TYPE_NAME: &'static str = "currency";

    fn to_internal_value(value: &Value) -> Result<Decimal, String> {
        let Value::Number(n) = value else {
            return Err("expected a number".to_string());
        };
        let text = n.to_string();
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .or_else(|e| n.as_f64().and_then(Decimal::from_f64).ok_or(e))
            .map_err(|e| format!("invalid amount {text}: {e}"))
    }

    fn to_record_value(value: &Decimal) -> Value {
        let integral = if value.fract().is_zero() {
            value.to_i64().map(JsonNumber::from)
        } else {
            None
        };
        integral
            .or_else(|| value.to_f64().and_then(JsonNumber::from_f64))
            .map_or(Value::Null, Value::Number)
    }

    fn output(value: Option<Decimal>) -> Option<Decimal> {
        value
    }

    /// The wire carries a JSON number, so only amounts that survive the
    /// encoding unchanged are accepted.
    fn validate(value: &Decimal) -> Result<(), String> {
        match Self::to_internal_value(&Self::to_record_value(value)) {
            Ok(decoded) if decoded == *value => Ok(()),
            Ok(decoded) => Err(format!(
                "amount {value} cannot be sent exactly (would become {decoded})"
            )),
            Err(_) => Err(format!("amount {value} cannot be sent as a number")),
        }
    }
}

/// Checkbox; a missing value reads as `false`
#[derive(Debug, Clone, Copy)]
pub struct Checkbox;

impl FieldKind for Checkbox {
    type Value = bool;
    type Output = bool;
    const TYPE_NAME: &'static str = "checkbox";

    fn to_internal_value(value: &Value) -> Result<bool, String> {
        value.as_bool().ok_or_else(|| "expected a boolean".to_string())
    }

    fn to_record_value(value: &bool) -> Value {
        Value::Bool(*value)
    }

    fn output(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }
}

/// Calendar date, `YYYY-MM-DD` on the wire
#[derive(Debug, Clone, Copy)]
pub struct Date;

impl FieldKind for Date {
    type Value = NaiveDate;
    type Output = Option<NaiveDate>;
    const TYPE_NAME: &'static str = "date";

    fn to_internal_value(value: &Value) -> Result<NaiveDate, String> {
        let text = value.as_str().ok_or_else(|| "expected a date string".to_string())?;
        NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| format!("invalid date '{text}': {e}"))
    }

    fn to_record_value(value: &NaiveDate) -> Value {
        Value::String(value.format(DATE_FORMAT).to_string())
    }

    fn output(value: Option<NaiveDate>) -> Option<NaiveDate> {
        value
    }
}

/// UTC timestamp with millisecond precision on the wire
#[derive(Debug, Clone, Copy)]
pub struct Datetime;

impl FieldKind for Datetime {
    type Value = DateTime<Utc>;
    type Output = Option<DateTime<Utc>>;
    const TYPE_NAME: &'static str = "datetime";

    fn to_internal_value(value: &Value) -> Result<DateTime<Utc>, String> {
        let text = value
            .as_str()
            .ok_or_else(|| "expected a datetime string".to_string())?;
        parse_datetime(text)
    }

    fn to_record_value(value: &DateTime<Utc>) -> Value {
        Value::String(format_datetime(value))
    }

    fn output(value: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        value
    }

    /// Sub-millisecond precision is lost on the wire; callers can use
    /// `chrono::SubsecRound::trunc_subsecs(3)` before writing.
    fn validate(value: &DateTime<Utc>) -> Result<(), String> {
        if value.timestamp_subsec_nanos() % 1_000_000 == 0 {
            Ok(())
        } else {
            Err(format!(
                "datetime {} has sub-millisecond precision",
                value.to_rfc3339()
            ))
        }
    }
}

/// Duration, seconds on the wire, microsecond precision
#[derive(Debug, Clone, Copy)]
pub struct DurationKind;

impl FieldKind for DurationKind {
    type Value = chrono::Duration;
    type Output = Option<chrono::Duration>;
    const TYPE_NAME: &'static str = "duration";

    fn to_internal_value(value: &Value) -> Result<chrono::Duration, String> {
        let seconds = value
            .as_f64()
            .ok_or_else(|| "expected a number of seconds".to_string())?;
        let micros = (seconds * 1_000_000.0).round();
        if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
            return Err(format!("duration out of range: {seconds}"));
        }
        Ok(chrono::Duration::microseconds(micros as i64))
    }

    fn to_record_value(value: &chrono::Duration) -> Value {
        match value.num_microseconds() {
            Some(micros) if micros % 1_000_000 == 0 => Value::from(micros / 1_000_000),
            Some(micros) => JsonNumber::from_f64(micros as f64 / 1_000_000.0)
                .map_or(Value::Null, Value::Number),
            None => Value::from(value.num_seconds()),
        }
    }

    fn output(value: Option<chrono::Duration>) -> Option<chrono::Duration> {
        value
    }
}

/// Multiple select; a missing value reads as `[]`
#[derive(Debug, Clone, Copy)]
pub struct MultipleSelect;

impl FieldKind for MultipleSelect {
    type Value = Vec<String>;
    type Output = Vec<String>;
    const TYPE_NAME: &'static str = "multiple select";

    fn to_internal_value(value: &Value) -> Result<Vec<String>, String> {
        from_json(value)
    }

    fn to_record_value(value: &Vec<String>) -> Value {
        to_json(value)
    }

    fn output(value: Option<Vec<String>>) -> Vec<String> {
        value.unwrap_or_default()
    }

    fn is_empty(value: &Vec<String>) -> bool {
        value.is_empty()
    }
}

/// Attachments; a missing value reads as `[]`
#[derive(Debug, Clone, Copy)]
pub struct Attachments;

impl FieldKind for Attachments {
    type Value = Vec<Attachment>;
    type Output = Vec<Attachment>;
    const TYPE_NAME: &'static str = "attachments";

    fn to_internal_value(value: &Value) -> Result<Vec<Attachment>, String> {
        from_json(value)
    }

    fn to_record_value(value: &Vec<Attachment>) -> Value {
        to_json(value)
    }

    fn output(value: Option<Vec<Attachment>>) -> Vec<Attachment> {
        value.unwrap_or_default()
    }

    fn is_empty(value: &Vec<Attachment>) -> bool {
        value.is_empty()
    }
}

/// A single user
#[derive(Debug, Clone, Copy)]
pub struct CollaboratorKind;

impl FieldKind for CollaboratorKind {
    type Value = Collaborator;
    type Output = Option<Collaborator>;
    const TYPE_NAME: &'static str = "collaborator";

    fn to_internal_value(value: &Value) -> Result<Collaborator, String> {
        if !value.is_object() {
            return Err("expected an object".to_string());
        }
        from_json(value)
    }

    fn to_record_value(value: &Collaborator) -> Value {
        to_json(value)
    }

    fn output(value: Option<Collaborator>) -> Option<Collaborator> {
        value
    }
}

/// Several users; a missing value reads as `[]`
#[derive(Debug, Clone, Copy)]
pub struct MultipleCollaborators;

impl FieldKind for MultipleCollaborators {
    type Value = Vec<Collaborator>;
    type Output = Vec<Collaborator>;
    const TYPE_NAME: &'static str = "multiple collaborators";

    fn to_internal_value(value: &Value) -> Result<Vec<Collaborator>, String> {
        from_json(value)
    }

    fn to_record_value(value: &Vec<Collaborator>) -> Value {
        to_json(value)
    }

    fn output(value: Option<Vec<Collaborator>>) -> Vec<Collaborator> {
        value.unwrap_or_default()
    }

    fn is_empty(value: &Vec<Collaborator>) -> bool {
        value.is_empty()
    }
}

/// Barcode value
#[derive(Debug, Clone, Copy)]
pub struct BarcodeKind;

impl FieldKind for BarcodeKind {
    type Value = Barcode;
    type Output = Option<Barcode>;
    const TYPE_NAME: &'static str = "barcode";

    fn to_internal_value(value: &Value) -> Result<Barcode, String> {
        from_json(value)
    }

    fn to_record_value(value: &Barcode) -> Value {
        to_json(value)
    }

    fn output(value: Option<Barcode>) -> Option<Barcode> {
        value
    }
}

/// Button (computed)
#[derive(Debug, Clone, Copy)]
pub struct ButtonKind;

impl FieldKind for ButtonKind {
    type Value = Button;
    type Output = Option<Button>;
    const TYPE_NAME: &'static str = "button";
    const READONLY: bool = true;

    fn to_internal_value(value: &Value) -> Result<Button, String> {
        from_json(value)
    }

    fn to_record_value(value: &Button) -> Value {
        to_json(value)
    }

    fn output(value: Option<Button>) -> Option<Button> {
        value
    }
}

/// Lookup or rollup values (computed); a missing value reads as `[]`
#[derive(Debug, Clone, Copy)]
pub struct Lookup;

impl FieldKind for Lookup {
    type Value = Vec<Value>;
    type Output = Vec<Value>;
    const TYPE_NAME: &'static str = "lookup";
    const READONLY: bool = true;

    fn to_internal_value(value: &Value) -> Result<Vec<Value>, String> {
        match value {
            Value::Array(items) => Ok(items.clone()),
            _ => Err("expected an array".to_string()),
        }
    }

    fn to_record_value(value: &Vec<Value>) -> Value {
        Value::Array(value.clone())
    }

    fn output(value: Option<Vec<Value>>) -> Vec<Value> {
        value.unwrap_or_default()
    }

    fn is_empty(value: &Vec<Value>) -> bool {
        value.is_empty()
    }
}

/// Defines a computed kind that converts like `$base` but rejects writes.
macro_rules! readonly_kind {
    ($(#[$doc:meta])* $name:ident => $base:ty, $type_name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl FieldKind for $name {
            type Value = <$base as FieldKind>::Value;
            type Output = <$base as FieldKind>::Output;
            const TYPE_NAME: &'static str = $type_name;
            const READONLY: bool = true;

            fn to_internal_value(value: &Value) -> Result<Self::Value, String> {
                <$base as FieldKind>::to_internal_value(value)
            }

            fn to_record_value(value: &Self::Value) -> Value {
                <$base as FieldKind>::to_record_value(value)
            }

            fn output(value: Option<Self::Value>) -> Self::Output {
                <$base as FieldKind>::output(value)
            }

            fn is_empty(value: &Self::Value) -> bool {
                <$base as FieldKind>::is_empty(value)
            }
        }
    };
}

readonly_kind!(
    /// Auto-incrementing number
    AutoNumber => Integer, "autonumber"
);
readonly_kind!(
    /// Count of linked records
    Count => Integer, "count"
);
readonly_kind!(
    /// Record creation time
    CreatedTime => Datetime, "created time"
);
readonly_kind!(
    /// Last modification time
    LastModifiedTime => Datetime, "last modified time"
);
readonly_kind!(
    /// User who created the record
    CreatedBy => CollaboratorKind, "created by"
);
readonly_kind!(
    /// User who last modified the record
    LastModifiedBy => CollaboratorKind, "last modified by"
);
