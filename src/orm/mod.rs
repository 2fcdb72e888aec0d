//! Typed models over tables
//!
//! A model is a plain struct holding a [`RecordState`] plus a set of `const`
//! field descriptors that map attributes to columns:
//!
//! ```no_run
//! use airtable_kit::orm::{FieldSpec, Model, ModelMeta, RecordState, TextField, CheckboxField};
//!
//! struct Task {
//!     state: RecordState,
//! }
//!
//! impl Task {
//!     const NAME: TextField = TextField::new("name", "Name");
//!     const DONE: CheckboxField = CheckboxField::new("done", "Done");
//! }
//!
//! impl Model for Task {
//!     const FIELDS: &'static [&'static dyn FieldSpec] = &[&Task::NAME, &Task::DONE];
//!
//!     fn meta() -> ModelMeta {
//!         ModelMeta::new("appXXXXXXXXXXXXXX", "Tasks")
//!     }
//!     fn state(&self) -> &RecordState {
//!         &self.state
//!     }
//!     fn state_mut(&mut self) -> &mut RecordState {
//!         &mut self.state
//!     }
//!     fn from_state(state: RecordState) -> Self {
//!         Self { state }
//!     }
//! }
//! ```

pub mod cache;
pub mod fields;
pub mod model;
pub mod state;

use thiserror::Error;

use crate::client::ApiError;

pub use cache::RecordCache;
pub use fields::*;
pub use model::{Model, ModelMeta, SaveOptions, SaveResult};
pub use state::{LinkedRecord, RecordState};

/// ORM errors
#[derive(Error, Debug)]
pub enum OrmError {
    /// The underlying request failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A required field is missing or empty
    #[error("field '{field}' is required but has no value")]
    MissingValue {
        /// Column name
        field: String,
    },

    /// A value does not match the field's type
    #[error("field '{field}' expects {expected}, got {found}")]
    InvalidType {
        /// Column name
        field: String,
        /// Field type
        expected: &'static str,
        /// JSON type received
        found: &'static str,
    },

    /// A value has the right type but is out of range
    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue {
        /// Column name
        field: String,
        /// What was wrong
        reason: String,
    },

    /// Write to a computed or readonly field
    #[error("field '{field}' is read-only")]
    Readonly {
        /// Column name
        field: String,
    },

    /// No descriptor with this attribute name
    #[error("{model} has no attribute '{attribute}'")]
    UnknownAttribute {
        /// Model type name
        model: &'static str,
        /// Attribute requested
        attribute: String,
    },

    /// The operation needs a saved record
    #[error("cannot {action} an unsaved {model}")]
    Unsaved {
        /// Model type name
        model: &'static str,
        /// Operation attempted
        action: &'static str,
    },

    /// A link points at a record that has not been saved yet
    #[error("field '{field}' links to a record that has not been saved")]
    UnsavedLink {
        /// Column name
        field: String,
    },

    /// The instance was deleted
    #[error("record {id} was deleted")]
    Deleted {
        /// Record id
        id: String,
    },

    /// A single-link field holds more than one record
    #[error("field '{field}' links to {count} records, expected at most one")]
    MultipleValues {
        /// Column name
        field: String,
        /// Linked record count
        count: usize,
    },

    /// A requested id was not returned by the service
    #[error("{model} record {id} not found")]
    RecordNotFound {
        /// Model type name
        model: &'static str,
        /// Record id
        id: String,
    },
}

impl OrmError {
    /// The underlying API error, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for ORM operations
pub type OrmResult<T> = std::result::Result<T, OrmError>;
