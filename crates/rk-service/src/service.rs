//! # Record Service
//!
//! The public operation surface for one managed resource. Each call walks
//! `resolve target(s) -> execute storage operation(s) -> normalize -> return`
//! and keeps no state between calls.
//!
//! Bulk create/patch/remove run one storage operation per row concurrently
//! and fail as a whole if any of them fails. Rows already written by the
//! successful operations stay written: bulk calls are not atomic.

use crate::error::{identity_hook, ErrorHook, Result, ServiceError};
use crate::model::Model;
use futures::future::try_join_all;
use rk_core::{assemble, FindResult, OneOrMany, Page, Paginate, QueryFilter, Record, Target};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

const DEFAULT_ID: &str = "id";

// =============================================================================
// Options
// =============================================================================

/// Construction options for a [`RecordService`].
#[derive(Clone, Default)]
pub struct ServiceOptions {
    pub model: Option<Arc<dyn Model>>,
    /// Primary-key field, `"id"` when unset.
    pub id: Option<String>,
    pub paginate: Option<Paginate>,
    /// Event names, carried for the hosting framework.
    pub events: Vec<String>,
    /// Resource name used in log output.
    pub name: Option<String>,
    pub error_hook: Option<ErrorHook>,
}

impl ServiceOptions {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn paginate(mut self, paginate: Paginate) -> Self {
        self.paginate = Some(paginate);
        self
    }

    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Install an error-translation function applied to every failure.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(ServiceError) -> ServiceError + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ServiceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOptions")
            .field("model", &self.model.is_some())
            .field("id", &self.id)
            .field("paginate", &self.paginate)
            .field("events", &self.events)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Per-call parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Query object: predicate fields plus `$select`/`$sort`/`$limit`/`$skip`.
    #[serde(default)]
    pub query: Map<String, Value>,
    /// Overrides the service's pagination policy for this call.
    #[serde(default)]
    pub paginate: Option<Paginate>,
}

impl Params {
    pub fn query(query: Map<String, Value>) -> Self {
        Self {
            query,
            paginate: None,
        }
    }

    /// Params from a JSON object; anything else yields an empty query.
    pub fn from_value(query: Value) -> Self {
        match query {
            Value::Object(map) => Self::query(map),
            _ => Self::default(),
        }
    }

    pub fn with_paginate(mut self, paginate: Paginate) -> Self {
        self.paginate = Some(paginate);
        self
    }
}

// =============================================================================
// Service
// =============================================================================

/// Rows returned by the count/fetch pair, before shaping.
struct Found {
    total: u64,
    limit: Option<u64>,
    skip: Option<u64>,
    rows: Vec<Record>,
}

pub struct RecordService {
    model: Arc<dyn Model>,
    id: String,
    paginate: Paginate,
    events: Vec<String>,
    name: String,
    error_hook: ErrorHook,
}

impl fmt::Debug for RecordService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordService")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("paginate", &self.paginate)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl RecordService {
    /// Fails with [`ServiceError::Config`] when `options` or its model is absent.
    pub fn new(options: impl Into<Option<ServiceOptions>>) -> Result<Self> {
        let options = options
            .into()
            .ok_or_else(|| ServiceError::Config("Options have to be provided".into()))?;
        let model = options
            .model
            .ok_or_else(|| ServiceError::Config("You must provide a Model".into()))?;

        let id = options.id.unwrap_or_else(|| DEFAULT_ID.to_string());
        let name = options.name.unwrap_or_else(|| "records".to_string());
        tracing::debug!(service = %name, id = %id, paginate = ?options.paginate, "record service ready");

        Ok(Self {
            model,
            id,
            paginate: options.paginate.unwrap_or_default(),
            events: options.events,
            name,
            error_hook: options.error_hook.unwrap_or_else(identity_hook),
        })
    }

    /// The primary-key field name.
    pub fn id_field(&self) -> &str {
        &self.id
    }

    pub fn paginate(&self) -> &Paginate {
        &self.paginate
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -------------------------------------------------------------------------
    // Public operations
    // -------------------------------------------------------------------------

    /// Rows matching `params.query`, enveloped when pagination is enabled.
    pub async fn find(&self, params: Params) -> Result<FindResult> {
        let result = self.find_shaped(params).await;
        self.report(result)
    }

    /// The one row with primary key `id` that also satisfies `params.query`.
    pub async fn get(&self, id: impl Into<Value>, params: Params) -> Result<Record> {
        let result = self.get_row(&id.into(), &params).await;
        self.report(result)
    }

    /// Insert one or many rows, returning each as stored.
    pub async fn create(&self, data: OneOrMany<Record>, params: Params) -> Result<OneOrMany<Record>> {
        let result = match data {
            OneOrMany::One(attributes) => self.create_row(attributes, &params).await.map(OneOrMany::One),
            OneOrMany::Many(items) => {
                tracing::debug!(service = %self.name, count = items.len(), "bulk create");
                try_join_all(items.into_iter().map(|attributes| self.create_row(attributes, &params)))
                    .await
                    .map(OneOrMany::Many)
            }
        };
        self.report(result)
    }

    /// Merge `data` into the targeted row(s). Fields absent from `data` are
    /// left untouched and the primary key is never written.
    pub async fn patch(&self, target: Target, data: Record, params: Params) -> Result<OneOrMany<Record>> {
        let changes = data.without(&self.id);
        let result = match target {
            Target::AllMatching(query) => self.patch_matching(&query, changes).await.map(OneOrMany::Many),
            Target::Single(id) => self.patch_one(&id, changes, &params).await.map(OneOrMany::One),
        };
        self.report(result)
    }

    /// Replace the targeted row: every stored field missing from `data`
    /// becomes `null`. Replacing many rows at once is refused.
    pub async fn update(&self, target: Target, data: Record, params: Params) -> Result<Record> {
        let result = match target {
            Target::AllMatching(_) => Err(ServiceError::BadRequest(
                "You can not replace multiple instances. Did you mean 'patch'?".into(),
            )),
            Target::Single(id) => self.replace_one(&id, &data, &params).await,
        };
        self.report(result)
    }

    /// Delete the targeted row(s), returning what they held beforehand.
    pub async fn remove(&self, target: Target, params: Params) -> Result<OneOrMany<Record>> {
        let result = match target {
            Target::AllMatching(query) => self.remove_matching(&query).await.map(OneOrMany::Many),
            Target::Single(id) => self.remove_one(&id, &params).await.map(OneOrMany::One),
        };
        self.report(result)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|err| {
            tracing::debug!(service = %self.name, error = %err, kind = ?err.kind(), "operation failed");
            (self.error_hook)(err)
        })
    }

    async fn find_rows(&self, query: &Map<String, Value>, paginate: Option<&Paginate>) -> Result<Found> {
        let filter = QueryFilter::parse(query, paginate)?;
        let plans = assemble(&self.id, &filter)?;

        let total = self
            .model
            .count(&plans.unbounded)
            .await
            .map_err(ServiceError::Storage)?;

        let rows = match &plans.paginated {
            Some(plan) => self.model.fetch_all(plan).await.map_err(ServiceError::Storage)?,
            None => Vec::new(),
        };

        Ok(Found {
            total,
            limit: filter.filters.limit,
            skip: filter.filters.skip,
            rows,
        })
    }

    async fn find_shaped(&self, params: Params) -> Result<FindResult> {
        let paginate = params.paginate.unwrap_or(self.paginate);
        let found = self.find_rows(&params.query, Some(&paginate)).await?;

        if !paginate.is_enabled() {
            return Ok(FindResult::All(found.rows));
        }
        Ok(FindResult::Page(Page {
            total: found.total,
            limit: found.limit.unwrap_or(0),
            skip: found.skip.unwrap_or(0),
            data: found.rows,
        }))
    }

    async fn patch_matching(&self, query: &Map<String, Value>, changes: Record) -> Result<Vec<Record>> {
        let found = self.find_rows(query, None).await?;
        tracing::debug!(service = %self.name, rows = found.rows.len(), "bulk patch");
        try_join_all(found.rows.iter().map(|row| self.write_row(row, changes.clone()))).await
    }

    async fn patch_one(&self, id: &Value, changes: Record, params: &Params) -> Result<Record> {
        let row = self.get_row(id, params).await?;
        self.write_row(&row, changes).await
    }

    async fn replace_one(&self, id: &Value, data: &Record, params: &Params) -> Result<Record> {
        let row = self.get_row(id, params).await?;
        let replacement = compute_replacement(&row, data, &self.id);
        self.write_row(&row, replacement).await
    }

    async fn remove_matching(&self, query: &Map<String, Value>) -> Result<Vec<Record>> {
        let found = self.find_rows(query, None).await?;
        tracing::debug!(service = %self.name, rows = found.rows.len(), "bulk remove");
        try_join_all(found.rows.into_iter().map(|row| self.delete_row(row))).await
    }

    async fn remove_one(&self, id: &Value, params: &Params) -> Result<Record> {
        let row = self.get_row(id, params).await?;
        self.delete_row(row).await
    }

    async fn get_row(&self, id: &Value, params: &Params) -> Result<Record> {
        let mut query = params.query.clone();
        query.insert(self.id.clone(), id.clone());

        let mut found = self.find_rows(&query, None).await?;
        if found.rows.len() > 1 {
            tracing::warn!(
                service = %self.name,
                id = %display_id(id),
                rows = found.rows.len(),
                "primary key matched more than one row"
            );
        }
        match found.rows.len() {
            1 => Ok(found.rows.remove(0)),
            _ => Err(ServiceError::NotFound(format!(
                "No record found for id '{}'",
                display_id(id)
            ))),
        }
    }

    async fn create_row(&self, attributes: Record, params: &Params) -> Result<Record> {
        let id = self
            .model
            .insert(attributes)
            .await
            .map_err(ServiceError::Storage)?;
        self.get_row(&id, params).await
    }

    async fn write_row(&self, row: &Record, changes: Record) -> Result<Record> {
        let id = self.row_id(row)?;
        self.model.update(id, changes).await.map_err(ServiceError::Storage)
    }

    async fn delete_row(&self, row: Record) -> Result<Record> {
        let id = self.row_id(&row)?;
        self.model.delete(id).await.map_err(ServiceError::Storage)?;
        Ok(row)
    }

    fn row_id<'r>(&self, row: &'r Record) -> Result<&'r Value> {
        row.id(&self.id)
            .ok_or_else(|| ServiceError::storage(format!("row has no value for primary key '{}'", self.id)))
    }
}

/// Replacement attributes for an update.
///
/// Every field of `old` takes its value from `new`, or `null` when `new`
/// lacks it. Fields the stored row does not have are dropped, and the
/// primary key is never part of the result.
pub fn compute_replacement(old: &Record, new: &Record, primary_key: &str) -> Record {
    old.keys()
        .filter(|field| field.as_str() != primary_key)
        .map(|field| {
            let value = new.get(field).cloned().unwrap_or(Value::Null);
            (field.clone(), value)
        })
        .collect()
}

fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
