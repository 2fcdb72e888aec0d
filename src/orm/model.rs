//! Model trait and record lifecycle
//!
//! Per instance: unsaved until the first `save` creates the record, clean or
//! dirty after that depending on writes through descriptors, and deleted once
//! `delete` succeeds. Deleted instances reject every further operation.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use super::fields::kinds::{format_datetime, parse_datetime};
use super::fields::FieldSpec;
use super::state::RecordState;
use super::{OrmError, OrmResult};
use crate::api::{Api, Table, WriteOptions};
use crate::client::{ApiError, QueryOptions};
use crate::formulas;
use crate::types::{Comment, Fields, RecordDict, UpdateRecord};

/// Where a model's records live and how writes behave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    /// Base id (`app...`)
    pub base_id: String,
    /// Table name or id
    pub table_name: String,
    /// Send `typecast` with writes
    pub typecast: bool,
    /// Read and populate the [`Api`]'s record cache
    pub memoize: bool,
}

impl ModelMeta {
    /// Typecast on, memoization off
    pub fn new(base_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            table_name: table_name.into(),
            typecast: true,
            memoize: false,
        }
    }

    /// Set `typecast`
    pub fn with_typecast(mut self, typecast: bool) -> Self {
        self.typecast = typecast;
        self
    }

    /// Set `memoize`
    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }
}

/// Options for [`Model::save_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Send every writable field, even when nothing is dirty
    pub force: bool,
}

impl SaveOptions {
    /// Full write
    pub fn force() -> Self {
        Self { force: true }
    }
}

/// What a save did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    /// Id of the saved record
    pub record_id: String,
    /// A new record was created
    pub created: bool,
    /// Every writable field was sent
    pub forced: bool,
    /// Fields sent to the service
    pub field_names: BTreeSet<String>,
}

impl SaveResult {
    /// Whether no request was made
    pub fn is_noop(&self) -> bool {
        !self.created && !self.forced && self.field_names.is_empty()
    }
}

/// A struct mapped onto the records of one table
#[async_trait]
pub trait Model: Sized + Send + Sync + 'static {
    /// Every descriptor of the model
    const FIELDS: &'static [&'static dyn FieldSpec];

    /// Base, table and write settings
    fn meta() -> ModelMeta;

    /// Per-record state
    fn state(&self) -> &RecordState;

    /// Per-record state, mutable
    fn state_mut(&mut self) -> &mut RecordState;

    /// Wrap existing state
    fn from_state(state: RecordState) -> Self;

    /// Type name without its module path
    fn model_name() -> &'static str {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name)
    }

    /// A record that does not exist yet
    fn new() -> Self {
        Self::from_state(RecordState::new())
    }

    /// An instance that knows only its id; fields read as missing until fetched
    fn with_id(record_id: impl Into<String>) -> Self {
        Self::from_state(RecordState::with_id(record_id))
    }

    /// Record id; empty until saved
    fn id(&self) -> &str {
        self.state().id()
    }

    /// Creation time reported by the service
    fn created_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state().created_time()
    }

    /// Whether the record has been saved
    fn exists(&self) -> bool {
        self.state().exists()
    }

    /// Whether any field changed since the last load or save
    fn is_dirty(&self) -> bool {
        self.state().is_dirty()
    }

    /// Whether the record was deleted through this instance
    fn is_deleted(&self) -> bool {
        self.state().is_deleted()
    }

    /// Table handle for this model
    fn table(api: &Api) -> Table<'_> {
        let meta = Self::meta();
        api.table(meta.base_id, meta.table_name)
    }

    /// Descriptor bound to `attribute`
    fn descriptor(attribute: &str) -> Option<&'static dyn FieldSpec> {
        Self::FIELDS
            .iter()
            .copied()
            .find(|field| field.attribute() == attribute)
    }

    /// Set a field by attribute name from loosely typed JSON
    fn assign(&mut self, attribute: &str, value: Value) -> OrmResult<()> {
        let field = Self::descriptor(attribute).ok_or_else(|| OrmError::UnknownAttribute {
            model: Self::model_name(),
            attribute: attribute.to_string(),
        })?;
        field.assign(self.state_mut(), value)
    }

    /// Record shape of this instance, including computed fields
    fn to_record(&self) -> OrmResult<RecordDict> {
        let mut fields = Fields::new();
        for field in Self::FIELDS {
            if let Some(value) = field.dump(self.state())? {
                fields.insert(field.field_name().to_string(), value);
            }
        }
        Ok(RecordDict {
            id: self.id().to_string(),
            created_time: self
                .created_time()
                .map(|time| format_datetime(&time))
                .unwrap_or_default(),
            fields,
        })
    }

    /// Fields a save would send: all writable fields that were ever set, or
    /// only the dirty ones
    fn writable_fields(&self, only_dirty: bool) -> OrmResult<Fields> {
        let state = self.state();
        let dirty: BTreeSet<&str> = state.dirty_fields().collect();
        let mut fields = Fields::new();
        for field in Self::FIELDS.iter().filter(|field| !field.is_readonly()) {
            if only_dirty && !dirty.contains(field.field_name()) {
                continue;
            }
            if let Some(value) = field.dump(state)? {
                fields.insert(field.field_name().to_string(), value);
            }
        }
        Ok(fields)
    }

    /// Build an instance from a record; links stay unresolved
    fn from_record(record: RecordDict) -> OrmResult<Self> {
        load_state::<Self>(record).map(Self::from_state)
    }

    /// Fetch one record by id
    async fn from_id(api: &Api, record_id: &str) -> OrmResult<Self> {
        let meta = Self::meta();
        let cached = if meta.memoize {
            api.cache().get(&meta.base_id, &meta.table_name, record_id)
        } else {
            None
        };
        let record = match cached {
            Some(record) => record,
            None => {
                let record = Self::table(api).get(record_id, QueryOptions::new()).await?;
                if meta.memoize {
                    api.cache().insert(&meta.base_id, &meta.table_name, record.clone());
                }
                record
            }
        };
        let mut models = vec![Self::from_record(record)?];
        Self::resolve_links(api, &mut models).await?;
        Ok(models.remove(0))
    }

    /// Fetch several records in one lookup, in the order of `record_ids`
    async fn from_ids(api: &Api, record_ids: &[String]) -> OrmResult<Vec<Self>> {
        let states = fetch_states::<Self>(api, record_ids).await?;
        let mut models = Vec::with_capacity(record_ids.len());
        for id in record_ids {
            let state = states
                .get(id)
                .cloned()
                .ok_or_else(|| OrmError::RecordNotFound {
                    model: Self::model_name(),
                    id: id.clone(),
                })?;
            models.push(Self::from_state(state));
        }
        Self::resolve_links(api, &mut models).await?;
        Ok(models)
    }

    /// Every record matching `options`
    async fn all(api: &Api, options: QueryOptions) -> OrmResult<Vec<Self>> {
        let meta = Self::meta();
        let records = Self::table(api).all(options).await?;
        let mut models = Vec::with_capacity(records.len());
        for record in records {
            if meta.memoize {
                api.cache().insert(&meta.base_id, &meta.table_name, record.clone());
            }
            models.push(Self::from_record(record)?);
        }
        Self::resolve_links(api, &mut models).await?;
        Ok(models)
    }

    /// First record matching `options`
    async fn first(api: &Api, options: QueryOptions) -> OrmResult<Option<Self>> {
        let Some(record) = Self::table(api).first(options).await? else {
            return Ok(None);
        };
        let mut models = vec![Self::from_record(record)?];
        Self::resolve_links(api, &mut models).await?;
        Ok(models.pop())
    }

    /// Reload every field from the service, discarding unsaved changes
    async fn fetch(&mut self, api: &Api) -> OrmResult<()> {
        ensure_live(self.state())?;
        if !self.exists() {
            return Err(OrmError::Unsaved {
                model: Self::model_name(),
                action: "fetch",
            });
        }
        let meta = Self::meta();
        let record = Self::table(api).get(self.id(), QueryOptions::new()).await?;
        if meta.memoize {
            api.cache().insert(&meta.base_id, &meta.table_name, record.clone());
        }
        *self.state_mut() = load_state::<Self>(record)?;
        Self::resolve_links(api, std::slice::from_mut(self)).await
    }

    /// Create the record, or send its dirty fields
    async fn save(&mut self, api: &Api) -> OrmResult<SaveResult> {
        self.save_with(api, SaveOptions::default()).await
    }

    /// Save with explicit options
    async fn save_with(&mut self, api: &Api, options: SaveOptions) -> OrmResult<SaveResult> {
        ensure_live(self.state())?;
        for field in Self::FIELDS {
            field.check_saveable(self.state())?;
        }
        let meta = Self::meta();
        let table = Self::table(api);

        if !self.exists() {
            let fields = self.writable_fields(false)?;
            let field_names = fields.keys().cloned().collect();
            let record = table.create(fields, meta.typecast).await?;
            apply_created(self.state_mut(), &record)?;
            info!(model = Self::model_name(), record_id = %record.id, "Created record");
            return Ok(SaveResult {
                record_id: record.id,
                created: true,
                forced: options.force,
                field_names,
            });
        }

        let record_id = self.id().to_string();
        let fields = self.writable_fields(!options.force)?;
        if fields.is_empty() && !options.force {
            debug!(model = Self::model_name(), record_id, "Nothing to save");
            return Ok(SaveResult {
                record_id,
                created: false,
                forced: false,
                field_names: BTreeSet::new(),
            });
        }

        let field_names: BTreeSet<String> = fields.keys().cloned().collect();
        table
            .update(&record_id, fields, WriteOptions::new().typecast(meta.typecast))
            .await?;
        self.state_mut().clear_dirty();
        if meta.memoize {
            api.cache().invalidate(&meta.base_id, &meta.table_name, &record_id);
        }
        debug!(
            model = Self::model_name(),
            record_id,
            fields = field_names.len(),
            forced = options.force,
            "Updated record"
        );
        Ok(SaveResult {
            record_id,
            created: false,
            forced: options.force,
            field_names,
        })
    }

    /// Delete the record; the instance is unusable afterwards
    async fn delete(&mut self, api: &Api) -> OrmResult<bool> {
        ensure_live(self.state())?;
        if !self.exists() {
            return Err(OrmError::Unsaved {
                model: Self::model_name(),
                action: "delete",
            });
        }
        let meta = Self::meta();
        let result = Self::table(api).delete(self.id()).await?;
        self.state_mut().deleted = true;
        if meta.memoize {
            api.cache().invalidate(&meta.base_id, &meta.table_name, &result.id);
        }
        Ok(result.deleted)
    }

    /// Create unsaved instances and fully update saved ones, one batch call each
    async fn batch_save(api: &Api, models: &mut [Self]) -> OrmResult<()> {
        for model in models.iter() {
            ensure_live(model.state())?;
            for field in Self::FIELDS {
                field.check_saveable(model.state())?;
            }
        }

        let meta = Self::meta();
        let table = Self::table(api);
        let mut create_indices = Vec::new();
        let mut creates = Vec::new();
        let mut update_indices = Vec::new();
        let mut updates = Vec::new();
        for (index, model) in models.iter().enumerate() {
            let fields = model.writable_fields(false)?;
            if model.exists() {
                update_indices.push(index);
                updates.push(UpdateRecord {
                    id: model.id().to_string(),
                    fields,
                });
            } else {
                create_indices.push(index);
                creates.push(fields);
            }
        }
        debug!(
            model = Self::model_name(),
            creates = creates.len(),
            updates = updates.len(),
            "Batch save"
        );

        if !creates.is_empty() {
            let created = table.batch_create(creates, meta.typecast).await?;
            if created.len() != create_indices.len() {
                return Err(ApiError::InvalidResponse(format!(
                    "expected {} created records, got {}",
                    create_indices.len(),
                    created.len()
                ))
                .into());
            }
            for (index, record) in create_indices.into_iter().zip(created.iter()) {
                apply_created(models[index].state_mut(), record)?;
            }
        }

        if !updates.is_empty() {
            table
                .batch_update(updates, WriteOptions::new().typecast(meta.typecast))
                .await?;
            for index in update_indices {
                let state = models[index].state_mut();
                state.clear_dirty();
                if meta.memoize {
                    api.cache().invalidate(&meta.base_id, &meta.table_name, state.id());
                }
            }
        }
        Ok(())
    }

    /// Delete several saved records in chunks
    async fn batch_delete(api: &Api, models: &mut [Self]) -> OrmResult<()> {
        for model in models.iter() {
            ensure_live(model.state())?;
            if !model.exists() {
                return Err(OrmError::Unsaved {
                    model: Self::model_name(),
                    action: "delete",
                });
            }
        }
        let meta = Self::meta();
        let ids: Vec<String> = models.iter().map(|model| model.id().to_string()).collect();
        Self::table(api).batch_delete(ids).await?;
        for model in models.iter_mut() {
            let state = model.state_mut();
            state.deleted = true;
            if meta.memoize {
                api.cache().invalidate(&meta.base_id, &meta.table_name, state.id());
            }
        }
        Ok(())
    }

    /// Comments on this record
    async fn comments(&self, api: &Api) -> OrmResult<Vec<Comment>> {
        ensure_live(self.state())?;
        if !self.exists() {
            return Err(OrmError::Unsaved {
                model: Self::model_name(),
                action: "list comments on",
            });
        }
        Ok(Self::table(api).comments(self.id()).await?)
    }

    /// Add a comment to this record
    async fn add_comment(&self, api: &Api, text: &str) -> OrmResult<Comment> {
        ensure_live(self.state())?;
        if !self.exists() {
            return Err(OrmError::Unsaved {
                model: Self::model_name(),
                action: "comment on",
            });
        }
        Ok(Self::table(api).add_comment(self.id(), text).await?)
    }

    /// Fetch eager links of every model with one lookup per link field
    async fn resolve_links(api: &Api, models: &mut [Self]) -> OrmResult<()> {
        if models.is_empty() {
            return Ok(());
        }
        for field in Self::FIELDS {
            let states = models.iter_mut().map(Self::state_mut).collect();
            field.resolve_links(api, states).await?;
        }
        Ok(())
    }
}

fn ensure_live(state: &RecordState) -> OrmResult<()> {
    if state.is_deleted() {
        return Err(OrmError::Deleted {
            id: state.id().to_string(),
        });
    }
    Ok(())
}

fn parse_created_time(record: &RecordDict) -> OrmResult<Option<chrono::DateTime<chrono::Utc>>> {
    if record.created_time.is_empty() {
        return Ok(None);
    }
    parse_datetime(&record.created_time)
        .map(Some)
        .map_err(|reason| ApiError::InvalidResponse(reason).into())
}

fn apply_created(state: &mut RecordState, record: &RecordDict) -> OrmResult<()> {
    state.assign_id(record.id.clone());
    state.created_time = parse_created_time(record)?;
    state.clear_dirty();
    Ok(())
}

/// Decode a record into state through the model's descriptors
pub(crate) fn load_state<M: Model>(record: RecordDict) -> OrmResult<RecordState> {
    let mut state = RecordState::with_id(record.id.clone());
    state.created_time = parse_created_time(&record)?;
    let RecordDict { mut fields, .. } = record;
    for field in M::FIELDS {
        if let Some(value) = fields.remove(field.field_name()) {
            field.load(&mut state, value)?;
        }
    }
    Ok(state)
}

/// States for `record_ids`, from the cache when memoizing, otherwise from one
/// `RECORD_ID()` lookup. Links of the fetched records are left unresolved.
pub(crate) async fn fetch_states<M: Model>(
    api: &Api,
    record_ids: &[String],
) -> OrmResult<HashMap<String, RecordState>> {
    let meta = M::meta();
    let mut records: HashMap<String, RecordDict> = HashMap::new();
    let mut missing = Vec::new();
    for id in record_ids {
        if records.contains_key(id) || missing.contains(id) {
            continue;
        }
        let cached = if meta.memoize {
            api.cache().get(&meta.base_id, &meta.table_name, id)
        } else {
            None
        };
        match cached {
            Some(record) => {
                records.insert(id.clone(), record);
            }
            None => missing.push(id.clone()),
        }
    }

    if !missing.is_empty() {
        debug!(
            model = M::model_name(),
            ids = missing.len(),
            cached = records.len(),
            "Fetching records by id"
        );
        let options = QueryOptions::new().with_formula(formulas::record_id_in(&missing));
        for record in M::table(api).all(options).await? {
            if meta.memoize {
                api.cache().insert(&meta.base_id, &meta.table_name, record.clone());
            }
            records.insert(record.id.clone(), record);
        }
    }

    let mut states = HashMap::with_capacity(records.len());
    for id in record_ids {
        if states.contains_key(id) {
            continue;
        }
        let record = records.remove(id).ok_or_else(|| OrmError::RecordNotFound {
            model: M::model_name(),
            id: id.clone(),
        })?;
        states.insert(id.clone(), load_state::<M>(record)?);
    }
    Ok(states)
}
