//! Per-instance record state
//!
//! Field descriptors are static and shared by every instance of a model, so
//! everything that varies per record lives here: id, creation time, wire
//! values keyed by field name, link targets, the dirty set and the deleted flag.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

/// One entry of a link field
#[derive(Debug, PartialEq)]
pub enum LinkedRecord {
    /// Only the id is known
    Unresolved(String),
    /// The linked record's state, fetched or assigned
    Resolved(Box<RecordState>),
}

impl Clone for LinkedRecord {
    fn clone(&self) -> Self {
        match self {
            Self::Unresolved(id) => Self::Unresolved(id.clone()),
            Self::Resolved(state) => Self::Resolved(Box::new(state.linked_copy())),
        }
    }
}

impl LinkedRecord {
    /// Link to `state`; the entry picks up the id once that record is saved
    pub fn to(state: &RecordState) -> Self {
        Self::Resolved(Box::new(state.linked_copy()))
    }

    /// Id of the linked record; empty while a linked instance is unsaved
    pub fn id(&self) -> &str {
        match self {
            Self::Unresolved(id) => id,
            Self::Resolved(state) => state.id(),
        }
    }

    /// Whether the linked record has been fetched or assigned as an instance
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Mutable state behind one model instance
///
/// Link entries share an identity cell with the instance they were taken
/// from, so saving that instance later gives the link its id. Plain clones
/// get a cell of their own.
#[derive(Debug, Default)]
pub struct RecordState {
    pub(crate) id: String,
    identity: Arc<OnceLock<String>>,
    pub(crate) created_time: Option<DateTime<Utc>>,
    pub(crate) values: BTreeMap<String, Value>,
    pub(crate) links: BTreeMap<String, Vec<LinkedRecord>>,
    pub(crate) dirty: BTreeSet<String>,
    pub(crate) deleted: bool,
}

impl Clone for RecordState {
    fn clone(&self) -> Self {
        let identity = OnceLock::new();
        if !self.id().is_empty() {
            let _ = identity.set(self.id().to_string());
        }
        Self {
            identity: Arc::new(identity),
            ..self.linked_copy()
        }
    }
}

impl PartialEq for RecordState {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
            && self.created_time == other.created_time
            && self.values == other.values
            && self.links == other.links
            && self.dirty == other.dirty
            && self.deleted == other.deleted
    }
}

impl RecordState {
    /// Empty state for a record that does not exist yet
    pub fn new() -> Self {
        Self::default()
    }

    /// State that only knows its id
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.assign_id(id.into());
        state
    }

    /// Record id; empty until saved
    pub fn id(&self) -> &str {
        if self.id.is_empty() {
            self.identity.get().map_or("", String::as_str)
        } else {
            &self.id
        }
    }

    /// Creation time reported by the service
    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.created_time
    }

    /// Whether the record has an id
    pub fn exists(&self) -> bool {
        !self.id().is_empty()
    }

    /// Whether the record was deleted through this instance
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether any field was written since the last load or save
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Field names written since the last load or save
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Raw wire value of a non-link field
    pub fn raw(&self, field_name: &str) -> Option<&Value> {
        self.values.get(field_name).filter(|value| !value.is_null())
    }

    /// Entries of a link field
    pub fn linked(&self, field_name: &str) -> &[LinkedRecord] {
        self.links.get(field_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy sharing this instance's identity cell
    pub(crate) fn linked_copy(&self) -> Self {
        Self {
            id: self.id.clone(),
            identity: Arc::clone(&self.identity),
            created_time: self.created_time,
            values: self.values.clone(),
            links: self.links.clone(),
            dirty: self.dirty.clone(),
            deleted: self.deleted,
        }
    }

    /// Record the id given by the service, visible to every clone
    pub(crate) fn assign_id(&mut self, id: String) {
        if !id.is_empty() {
            let _ = self.identity.set(id.clone());
        }
        self.id = id;
    }

    pub(crate) fn load_value(&mut self, field_name: &str, value: Value) {
        self.values.insert(field_name.to_string(), value);
    }

    pub(crate) fn put_value(&mut self, field_name: &str, value: Value) {
        self.values.insert(field_name.to_string(), value);
        self.dirty.insert(field_name.to_string());
    }

    pub(crate) fn load_links(&mut self, field_name: &str, links: Vec<LinkedRecord>) {
        self.links.insert(field_name.to_string(), links);
    }

    pub(crate) fn put_links(&mut self, field_name: &str, links: Vec<LinkedRecord>) {
        self.links.insert(field_name.to_string(), links);
        self.dirty.insert(field_name.to_string());
    }

    pub(crate) fn links_mut(&mut self, field_name: &str) -> Option<&mut Vec<LinkedRecord>> {
        self.links.get_mut(field_name)
    }

    pub(crate) fn mark_dirty(&mut self, field_name: &str) {
        self.dirty.insert(field_name.to_string());
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}
