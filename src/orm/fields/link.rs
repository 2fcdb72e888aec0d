//! Link fields

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

use super::{ensure_writable, json_type, FieldSpec};
use crate::api::Api;
use crate::orm::model::fetch_states;
use crate::orm::state::{LinkedRecord, RecordState};
use crate::orm::{Model, OrmError, OrmResult};

/// Links to any number of records of model `M`
///
/// Links are eager by default: loading a record through [`Model`] fetches the
/// linked records in the same call, one level deep. Mark a field `lazy()` to
/// keep only ids until [`LinkField::resolve`] is called.
pub struct LinkField<M: Model> {
    attribute: &'static str,
    field_name: &'static str,
    lazy: bool,
    readonly: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for LinkField<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Model> Copy for LinkField<M> {}

impl<M: Model> fmt::Debug for LinkField<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkField")
            .field("attribute", &self.attribute)
            .field("field_name", &self.field_name)
            .field("model", &M::model_name())
            .field("lazy", &self.lazy)
            .finish()
    }
}

impl<M: Model> LinkField<M> {
    /// Bind `attribute` to the column `field_name`
    pub const fn new(attribute: &'static str, field_name: &'static str) -> Self {
        Self {
            attribute,
            field_name,
            lazy: false,
            readonly: false,
            _model: PhantomData,
        }
    }

    /// Keep only ids on load
    pub const fn lazy(self) -> Self {
        Self { lazy: true, ..self }
    }

    /// Reject every write
    pub const fn readonly(self) -> Self {
        Self {
            readonly: true,
            ..self
        }
    }

    /// Column name
    pub const fn field_name(&self) -> &'static str {
        self.field_name
    }

    /// Whether links are left unresolved on load
    pub const fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Linked records; unresolved entries carry only their id
    pub fn get<O: Model>(&self, model: &O) -> Vec<M> {
        model
            .state()
            .linked(self.field_name)
            .iter()
            .map(|link| match link {
                LinkedRecord::Resolved(state) => M::from_state(state.as_ref().clone()),
                LinkedRecord::Unresolved(id) => M::from_state(RecordState::with_id(id.clone())),
            })
            .collect()
    }

    /// Ids of the linked records
    pub fn ids<O: Model>(&self, model: &O) -> Vec<String> {
        model
            .state()
            .linked(self.field_name)
            .iter()
            .map(|link| link.id().to_string())
            .collect()
    }

    /// Whether every link has been fetched or assigned as an instance
    pub fn is_resolved<O: Model>(&self, model: &O) -> bool {
        model
            .state()
            .linked(self.field_name)
            .iter()
            .all(LinkedRecord::is_resolved)
    }

    /// Replace the links with `records`
    pub fn set<O: Model>(&self, model: &mut O, records: &[M]) -> OrmResult<()> {
        let state = model.state_mut();
        ensure_writable(state, self.field_name, self.readonly)?;
        let links = records
            .iter()
            .map(|record| LinkedRecord::to(record.state()))
            .collect();
        state.put_links(self.field_name, links);
        Ok(())
    }

    /// Replace the links with bare record ids
    pub fn set_ids<O, I, S>(&self, model: &mut O, ids: I) -> OrmResult<()>
    where
        O: Model,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = model.state_mut();
        ensure_writable(state, self.field_name, self.readonly)?;
        let links = ids
            .into_iter()
            .map(|id| LinkedRecord::Unresolved(id.into()))
            .collect();
        state.put_links(self.field_name, links);
        Ok(())
    }

    /// Append one linked record
    pub fn push<O: Model>(&self, model: &mut O, record: &M) -> OrmResult<()> {
        let state = model.state_mut();
        ensure_writable(state, self.field_name, self.readonly)?;
        let mut links = state.linked(self.field_name).to_vec();
        links.push(LinkedRecord::to(record.state()));
        state.put_links(self.field_name, links);
        Ok(())
    }

    /// Drop every link to `record_id`; returns whether any was removed
    pub fn remove<O: Model>(&self, model: &mut O, record_id: &str) -> OrmResult<bool> {
        let state = model.state_mut();
        ensure_writable(state, self.field_name, self.readonly)?;
        let Some(links) = state.links_mut(self.field_name) else {
            return Ok(false);
        };
        let before = links.len();
        links.retain(|link| link.id() != record_id);
        let removed = links.len() != before;
        if removed {
            state.mark_dirty(self.field_name);
        }
        Ok(removed)
    }

    /// Fetch unresolved links now, whether or not the field is lazy
    pub async fn resolve<O: Model>(&self, api: &Api, model: &mut O) -> OrmResult<()> {
        self.resolve_states(api, vec![model.state_mut()]).await
    }

    async fn resolve_states(&self, api: &Api, mut states: Vec<&mut RecordState>) -> OrmResult<()> {
        let mut seen = BTreeSet::new();
        let ids: Vec<String> = states
            .iter()
            .flat_map(|state| state.linked(self.field_name).iter())
            .filter(|link| !link.is_resolved())
            .map(|link| link.id().to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let fetched = fetch_states::<M>(api, &ids).await?;
        debug!(
            field = self.field_name,
            model = M::model_name(),
            linked = fetched.len(),
            "Resolved links"
        );
        for state in states.iter_mut() {
            let Some(links) = state.links_mut(self.field_name) else {
                continue;
            };
            for link in links.iter_mut() {
                if let LinkedRecord::Unresolved(id) = link {
                    if let Some(target) = fetched.get(id.as_str()) {
                        *link = LinkedRecord::Resolved(Box::new(target.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_ids(&self, value: &Value) -> OrmResult<Vec<LinkedRecord>> {
        let invalid = || OrmError::InvalidType {
            field: self.field_name.to_string(),
            expected: "list of record ids",
            found: json_type(value),
        };
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(|id| LinkedRecord::Unresolved(id.to_string()))
                        .ok_or_else(invalid)
                })
                .collect(),
            _ => Err(invalid()),
        }
    }
}

impl<M: Model> FieldSpec for LinkField<M> {
    fn attribute(&self) -> &'static str {
        self.attribute
    }

    fn field_name(&self) -> &'static str {
        self.field_name
    }

    fn type_name(&self) -> &'static str {
        "link"
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn load(&self, state: &mut RecordState, value: Value) -> OrmResult<()> {
        let links = self.parse_ids(&value)?;
        state.load_links(self.field_name, links);
        Ok(())
    }

    fn dump(&self, state: &RecordState) -> OrmResult<Option<Value>> {
        if !state.links.contains_key(self.field_name) {
            return Ok(None);
        }
        self.check_saveable(state)?;
        let ids = state
            .linked(self.field_name)
            .iter()
            .map(|link| Value::String(link.id().to_string()))
            .collect();
        Ok(Some(Value::Array(ids)))
    }

    fn assign(&self, state: &mut RecordState, value: Value) -> OrmResult<()> {
        ensure_writable(state, self.field_name, self.readonly)?;
        let links = self.parse_ids(&value)?;
        state.put_links(self.field_name, links);
        Ok(())
    }

    fn check_saveable(&self, state: &RecordState) -> OrmResult<()> {
        if state.linked(self.field_name).iter().any(|link| link.id().is_empty()) {
            return Err(OrmError::UnsavedLink {
                field: self.field_name.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_links<'a>(
        &'a self,
        api: &'a Api,
        states: Vec<&'a mut RecordState>,
    ) -> BoxFuture<'a, OrmResult<()>> {
        Box::pin(async move {
            if self.lazy {
                return Ok(());
            }
            self.resolve_states(api, states).await
        })
    }
}

/// Link to at most one record of model `M`
///
/// The service always stores links as a list; this descriptor reads the first
/// entry, or fails with [`OrmError::MultipleValues`] when built with
/// `raise_if_many()` and more than one record is linked.
pub struct SingleLinkField<M: Model> {
    inner: LinkField<M>,
    raise_if_many: bool,
}

impl<M: Model> Clone for SingleLinkField<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Model> Copy for SingleLinkField<M> {}

impl<M: Model> fmt::Debug for SingleLinkField<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleLinkField")
            .field("inner", &self.inner)
            .field("raise_if_many", &self.raise_if_many)
            .finish()
    }
}

impl<M: Model> SingleLinkField<M> {
    /// Bind `attribute` to the column `field_name`
    pub const fn new(attribute: &'static str, field_name: &'static str) -> Self {
        Self {
            inner: LinkField::new(attribute, field_name),
            raise_if_many: false,
        }
    }

    /// Keep only the id on load
    pub const fn lazy(self) -> Self {
        Self {
            inner: self.inner.lazy(),
            raise_if_many: self.raise_if_many,
        }
    }

    /// Reject every write
    pub const fn readonly(self) -> Self {
        Self {
            inner: self.inner.readonly(),
            raise_if_many: self.raise_if_many,
        }
    }

    /// Fail reads when more than one record is linked
    pub const fn raise_if_many(self) -> Self {
        Self {
            inner: self.inner,
            raise_if_many: true,
        }
    }

    /// Column name
    pub const fn field_name(&self) -> &'static str {
        self.inner.field_name
    }

    /// The linked record, if any
    pub fn get<O: Model>(&self, model: &O) -> OrmResult<Option<M>> {
        let count = model.state().linked(self.inner.field_name).len();
        if self.raise_if_many && count > 1 {
            return Err(OrmError::MultipleValues {
                field: self.inner.field_name.to_string(),
                count,
            });
        }
        Ok(self.inner.get(model).into_iter().next())
    }

    /// Id of the linked record, if any
    pub fn id<O: Model>(&self, model: &O) -> Option<String> {
        self.inner.ids(model).into_iter().next()
    }

    /// Link `record`, or clear the link with `None`
    pub fn set<O: Model>(&self, model: &mut O, record: Option<&M>) -> OrmResult<()> {
        match record {
            Some(record) => self.inner.set(model, std::slice::from_ref(record)),
            None => self.inner.set(model, &[]),
        }
    }

    /// Fetch the linked record now, whether or not the field is lazy
    pub async fn resolve<O: Model>(&self, api: &Api, model: &mut O) -> OrmResult<()> {
        self.inner.resolve(api, model).await
    }
}

impl<M: Model> FieldSpec for SingleLinkField<M> {
    fn attribute(&self) -> &'static str {
        self.inner.attribute
    }

    fn field_name(&self) -> &'static str {
        self.inner.field_name
    }

    fn type_name(&self) -> &'static str {
        "single link"
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
        match value {
            Value::String(id) => self
                .inner
                .assign(state, Value::Array(vec![Value::String(id)])),
            other => self.inner.assign(state, other),
        }
    }

    fn check_saveable(&self, state: &RecordState) -> OrmResult<()> {
        self.inner.check_saveable(state)
    }

    fn resolve_links<'a>(
        &'a self,
        api: &'a Api,
        states: Vec<&'a mut RecordState>,
    ) -> BoxFuture<'a, OrmResult<()>> {
        self.inner.resolve_links(api, states)
    }
}
