//! Record cache for memoizing models

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::RecordDict;

type CacheKey = (String, String, String);

/// Records keyed by base id, table name and record id
///
/// Owned by an [`Api`](crate::api::Api) handle and shared by its clones; only
/// models whose [`ModelMeta::memoize`](crate::orm::ModelMeta::memoize) is set
/// read from or write to it.
#[derive(Default)]
pub struct RecordCache {
    records: Mutex<HashMap<CacheKey, RecordDict>>,
}

impl RecordCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, RecordDict>> {
        // Entries are inserted whole, so a poisoned map is still consistent
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(base_id: &str, table: &str, record_id: &str) -> CacheKey {
        (base_id.to_string(), table.to_string(), record_id.to_string())
    }

    /// Cached copy of a record
    pub fn get(&self, base_id: &str, table: &str, record_id: &str) -> Option<RecordDict> {
        self.lock().get(&Self::key(base_id, table, record_id)).cloned()
    }

    /// Store or replace a record
    pub fn insert(&self, base_id: &str, table: &str, record: RecordDict) {
        let key = Self::key(base_id, table, &record.id);
        self.lock().insert(key, record);
    }

    /// Drop one record; returns whether it was cached
    pub fn invalidate(&self, base_id: &str, table: &str, record_id: &str) -> bool {
        self.lock()
            .remove(&Self::key(base_id, table, record_id))
            .is_some()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCache")
            .field("records", &self.len())
            .finish()
    }
}
