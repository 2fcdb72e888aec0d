//! Field descriptors
//!
//! A descriptor binds a model attribute to a column (field name) and a
//! [`FieldKind`], which defines the wire/internal conversion. Descriptors are
//! `const` values declared once per model and listed in [`Model::FIELDS`];
//! per-record values live in the model's [`RecordState`].
//!
//! - [`Field<K>`]: optional value, reads return the kind's missing-value sentinel
//! - [`RequiredField<K>`]: reads and writes fail with [`OrmError::MissingValue`] on empty
//! - [`LinkField<M>`] / [`SingleLinkField<M>`]: links to records of model `M`
//!
//! [`Model::FIELDS`]: crate::orm::Model::FIELDS

pub mod kinds;
mod link;

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use super::state::RecordState;
use super::{Model, OrmError, OrmResult};
use crate::api::Api;

pub use kinds::*;
pub use link::{LinkField, SingleLinkField};

/// Conversion between a wire value and its internal representation
pub trait FieldKind: 'static {
    /// Internal representation
    type Value: Clone + fmt::Debug + PartialEq + Send + Sync;
    /// What [`Field::get`] returns
    type Output;
    /// Name used in type errors
    const TYPE_NAME: &'static str;
    /// Whether the service computes this field
    const READONLY: bool = false;

    /// Decode a wire value; `Err` carries a short reason
    fn to_internal_value(value: &Value) -> Result<Self::Value, String>;

    /// Encode for the wire
    fn to_record_value(value: &Self::Value) -> Value;

    /// Map a possibly-missing value to what readers see
    fn output(value: Option<Self::Value>) -> Self::Output;

    /// Whether the value counts as empty for required fields
    fn is_empty(_value: &Self::Value) -> bool {
        false
    }

    /// Range checks beyond the type itself
    fn validate(_value: &Self::Value) -> Result<(), String> {
        Ok(())
    }
}

/// Object-safe view of a descriptor, used by model-level operations
pub trait FieldSpec: Send + Sync {
    /// Attribute name on the model
    fn attribute(&self) -> &'static str;

    /// Column name on the service
    fn field_name(&self) -> &'static str;

    /// Type name for messages
    fn type_name(&self) -> &'static str;

    /// Whether writes are rejected
    fn is_readonly(&self) -> bool;

    /// Store a value received from the service; does not mark the field dirty
    fn load(&self, state: &mut RecordState, value: Value) -> OrmResult<()>;

    /// Wire value to send, `None` when the field was never set
    fn dump(&self, state: &RecordState) -> OrmResult<Option<Value>>;

    /// Assign from loosely typed JSON, validating unless built `unvalidated()`
    fn assign(&self, state: &mut RecordState, value: Value) -> OrmResult<()>;

    /// Fail if the field cannot be saved in its current state
    fn check_saveable(&self, _state: &RecordState) -> OrmResult<()> {
        Ok(())
    }

    /// Replace unresolved link ids with fetched records, for eager links
    fn resolve_links<'a>(
        &'a self,
        _api: &'a Api,
        _states: Vec<&'a mut RecordState>,
    ) -> BoxFuture<'a, OrmResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Reject writes to deleted records and readonly fields
pub(crate) fn ensure_writable(state: &RecordState, field_name: &str, readonly: bool) -> OrmResult<()> {
    if state.deleted {
        return Err(OrmError::Deleted {
            id: state.id().to_string(),
        });
    }
    if readonly {
        return Err(OrmError::Readonly {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

/// JSON type name for error messages
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Descriptor for an optional value of kind `K`
pub struct Field<K: FieldKind> {
    attribute: &'static str,
    field_name: &'static str,
    readonly: bool,
    validate_type: bool,
    _kind: PhantomData<fn() -> K>,
}

impl<K: FieldKind> Clone for Field<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: FieldKind> Copy for Field<K> {}

impl<K: FieldKind> fmt::Debug for Field<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("attribute", &self.attribute)
            .field("field_name", &self.field_name)
            .field("kind", &K::TYPE_NAME)
            .field("readonly", &self.readonly)
            .finish()
    }
}

impl<K: FieldKind> Field<K> {
    /// Bind `attribute` to the column `field_name`
    pub const fn new(attribute: &'static str, field_name: &'static str) -> Self {
        Self {
            attribute,
            field_name,
            readonly: K::READONLY,
            validate_type: true,
            _kind: PhantomData,
        }
    }

    /// Reject every write
    pub const fn readonly(self) -> Self {
        Self {
            readonly: true,
            ..self
        }
    }

    /// Skip type checks on [`Model::assign`](crate::orm::Model::assign)
    pub const fn unvalidated(self) -> Self {
        Self {
            validate_type: false,
            ..self
        }
    }

    /// Column name
    pub const fn field_name(&self) -> &'static str {
        self.field_name
    }

    /// Current value as the kind presents it (missing values become the sentinel)
    pub fn get<M: Model>(&self, model: &M) -> K::Output {
        K::output(self.value(model.state()))
    }

    /// Current value, `None` when missing or not decodable
    pub fn value(&self, state: &RecordState) -> Option<K::Value> {
        state
            .raw(self.field_name)
            .and_then(|raw| K::to_internal_value(raw).ok())
    }

    /// Write a value and mark the field dirty
    pub fn set<M: Model>(&self, model: &mut M, value: impl Into<K::Value>) -> OrmResult<()> {
        let value = value.into();
        let state = model.state_mut();
        ensure_writable(state, self.field_name, self.readonly)?;
        K::validate(&value).map_err(|reason| OrmError::InvalidValue {
            field: self.field_name.to_string(),
            reason,
        })?;
        state.put_value(self.field_name, K::to_record_value(&value));
        Ok(())
    }

    /// Clear the value; the next save sends `null`
    pub fn clear<M: Model>(&self, model: &mut M) -> OrmResult<()> {
        let state = model.state_mut();
        ensure_writable(state, self.field_name, self.readonly)?;
        state.put_value(self.field_name, Value::Null);
        Ok(())
    }

    fn decode(&self, value: &Value) -> OrmResult<K::Value> {
        K::to_internal_value(value).map_err(|_| OrmError::InvalidType {
            field: self.field_name.to_string(),
            expected: K::TYPE_NAME,
            found: json_type(value),
        })
    }
}

impl<K: FieldKind> FieldSpec for Field<K> {
    fn attribute(&self) -> &'static str {
        self.attribute
    }

    fn field_name(&self) -> &'static str {
        self.field_name
    }

    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn load(&self, state: &mut RecordState, value: Value) -> OrmResult<()> {
        if !value.is_null() {
            self.decode(&value)?;
        }
        state.load_value(self.field_name, value);
        Ok(())
    }

    fn dump(&self, state: &RecordState) -> OrmResult<Option<Value>> {
        Ok(state.values.get(self.field_name).cloned())
    }

    fn assign(&self, state: &mut RecordState, value: Value) -> OrmResult<()> {
        ensure_writable(state, self.field_name, self.readonly)?;
        if self.validate_type && !value.is_null() {
            let decoded = self.decode(&value)?;
            K::validate(&decoded).map_err(|reason| OrmError::InvalidValue {
                field: self.field_name.to_string(),
                reason,
            })?;
        }
        state.put_value(self.field_name, value);
        Ok(())
    }
}

/// Descriptor for a value of kind `K` that must be present and non-empty
pub struct RequiredField<K: FieldKind> {
    inner: Field<K>,
}

impl<K: FieldKind> Clone for RequiredField<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: FieldKind> Copy for RequiredField<K> {}

impl<K: FieldKind> fmt::Debug for RequiredField<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequiredField").field(&self.inner).finish()
    }
}

impl<K: FieldKind> RequiredField<K> {
    /// Bind `attribute` to the column `field_name`
    pub const fn new(attribute: &'static str, field_name: &'static str) -> Self {
        Self {
            inner: Field::new(attribute, field_name),
        }
    }

    /// Reject every write
    pub const fn readonly(self) -> Self {
        Self {
            inner: self.inner.readonly(),
        }
    }

    /// Skip type checks on [`Model::assign`](crate::orm::Model::assign)
    pub const fn unvalidated(self) -> Self {
        Self {
            inner: self.inner.unvalidated(),
        }
    }

    /// Column name
    pub const fn field_name(&self) -> &'static str {
        self.inner.field_name
    }

    /// Current value; missing or empty values are an error
    pub fn get<M: Model>(&self, model: &M) -> OrmResult<K::Value> {
        self.inner
            .value(model.state())
            .filter(|value| !K::is_empty(value))
            .ok_or_else(|| self.missing())
    }

    /// Write a non-empty value and mark the field dirty
    pub fn set<M: Model>(&self, model: &mut M, value: impl Into<K::Value>) -> OrmResult<()> {
        let value = value.into();
        if K::is_empty(&value) {
            return Err(self.missing());
        }
        self.inner.set(model, value)
    }

    fn missing(&self) -> OrmError {
        OrmError::MissingValue {
            field: self.inner.field_name.to_string(),
        }
    }
}

impl<K: FieldKind> FieldSpec for RequiredField<K> {
    fn attribute(&self) -> &'static str {
        self.inner.attribute
    }

    fn field_name(&self) -> &'static str {
        self.inner.field_name
    }

    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    fn load(&self, state: &mut RecordState, value: Value) -> OrmResult<()> {
        self.inner.load(state, value)
    }

    fn dump(&self, state: &RecordState) -> OrmResult<Option<Value>> {
        self.inner.dump(state)
    }

    fn assign(&self, state: &mut RecordState, value: Value) -> OrmResult<()> {
        if value.is_null() {
            return Err(self.missing());
        }
        let decoded = if self.inner.validate_type {
            Some(self.inner.decode(&value)?)
        } else {
            K::to_internal_value(&value).ok()
        };
        if decoded.as_ref().is_some_and(K::is_empty) {
            return Err(self.missing());
        }
        self.inner.assign(state, value)
    }
}

/// Any JSON value
pub type AnyField = Field<Any>;
/// Single line text
pub type TextField = Field<Text>;
/// Required single line text
pub type RequiredTextField = RequiredField<Text>;
/// Long text
pub type MultilineTextField = Field<Text>;
/// Rich text (markdown)
pub type RichTextField = Field<Text>;
/// Email address
pub type EmailField = Field<Text>;
/// Required email address
pub type RequiredEmailField = RequiredField<Text>;
/// URL
pub type UrlField = Field<Text>;
/// Phone number
pub type PhoneNumberField = Field<Text>;
/// Single select
pub type SelectField = Field<Text>;
/// Required single select
pub type RequiredSelectField = RequiredField<Text>;
/// Integer number
pub type IntegerField = Field<Integer>;
/// Required integer number
pub type RequiredIntegerField = RequiredField<Integer>;
/// Decimal number
pub type FloatField = Field<Float>;
/// Required decimal number
pub type RequiredFloatField = RequiredField<Float>;
/// Number preserving integer/float representation
pub type NumberField = Field<Number>;
/// Percentage (0.5 = 50%)
pub type PercentField = Field<Percent>;
/// Rating (1 and up)
pub type RatingField = Field<Rating>;
/// Currency amount
pub type CurrencyField = Field<Currency>;
/// Required currency amount
pub type RequiredCurrencyField = RequiredField<Currency>;
/// Checkbox
pub type CheckboxField = Field<Checkbox>;
/// Date without time
pub type DateField = Field<Date>;
/// Required date without time
pub type RequiredDateField = RequiredField<Date>;
/// Date and time in UTC
pub type DatetimeField = Field<Datetime>;
/// Required date and time in UTC
pub type RequiredDatetimeField = RequiredField<Datetime>;
/// Duration in seconds
pub type DurationField = Field<DurationKind>;
/// Multiple select
pub type MultipleSelectField = Field<MultipleSelect>;
/// Attachments
pub type AttachmentsField = Field<Attachments>;
/// Single collaborator
pub type CollaboratorField = Field<CollaboratorKind>;
/// Multiple collaborators
pub type MultipleCollaboratorsField = Field<MultipleCollaborators>;
/// Barcode
pub type BarcodeField = Field<BarcodeKind>;
/// Button (computed)
pub type ButtonField = RequiredField<ButtonKind>;
/// Lookup or rollup array (computed)
pub type LookupField = Field<Lookup>;
/// Auto number (computed, always present)
pub type AutoNumberField = RequiredField<AutoNumber>;
/// Count (computed)
pub type CountField = Field<Count>;
/// Created time (computed, always present)
pub type CreatedTimeField = RequiredField<CreatedTime>;
/// Last modified time (computed)
pub type LastModifiedTimeField = Field<LastModifiedTime>;
/// Created by (computed, always present)
pub type CreatedByField = RequiredField<CreatedBy>;
/// Last modified by (computed)
pub type LastModifiedByField = Field<LastModifiedBy>;
