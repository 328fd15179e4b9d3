//! # In-Memory Table
//!
//! A [`Model`] over a single table held in memory. Columns are fixed at
//! construction; inserts fill unspecified columns with their default (or
//! `NULL`), and writes naming an unknown column fail the way a relational
//! store would.

use crate::error::StoreError;
use crate::eval;
use crate::model::Model;
use rk_core::{QueryPlan, Record, SortDirection};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

pub struct MemoryModel {
    table: String,
    primary_key: String,
    columns: Vec<String>,
    defaults: Map<String, Value>,
    rows: RwLock<Vec<Record>>,
    next_id: AtomicI64,
}

impl MemoryModel {
    /// An empty table. The primary key is always the first column and is
    /// assigned from an auto-incrementing integer sequence.
    pub fn new<I, S>(table: impl Into<String>, primary_key: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let primary_key = primary_key.into();
        let mut all = vec![primary_key.clone()];
        for column in columns {
            let column = column.into();
            if !all.contains(&column) {
                all.push(column);
            }
        }

        Self {
            table: table.into(),
            primary_key,
            columns: all,
            defaults: Map::new(),
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Value stored in `column` when an insert leaves it out.
    pub fn with_default(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(column.into(), value.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Snapshot of every stored row, in insertion order.
    pub async fn rows(&self) -> Vec<Record> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Remove every row and restart the id sequence.
    pub async fn clear(&self) {
        self.rows.write().await.clear();
        self.next_id.store(1, Ordering::SeqCst);
    }

    fn check_columns(&self, record: &Record) -> Result<(), StoreError> {
        match record.keys().find(|key| !self.columns.contains(key)) {
            Some(unknown) => Err(format!("table {} has no column named {}", self.table, unknown).into()),
            None => Ok(()),
        }
    }

    fn is_key(&self, row: &Record, id: &Value) -> bool {
        row.id(&self.primary_key)
            .is_some_and(|stored| eval::values_equal(stored, id))
    }

    fn project(&self, row: &Record, select: Option<&Vec<String>>) -> Record {
        match select {
            Some(columns) => columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
            None => row.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Model for MemoryModel {
    async fn count(&self, plan: &QueryPlan) -> Result<u64, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| eval::matches(&plan.clause, row)).count() as u64)
    }

    async fn fetch_all(&self, plan: &QueryPlan) -> Result<Vec<Record>, StoreError> {
        let rows = self.rows.read().await;
        let mut matched: Vec<&Record> = rows
            .iter()
            .filter(|row| eval::matches(&plan.clause, row))
            .collect();

        if !plan.sort.is_empty() {
            // Stable, so ties keep insertion order.
            matched.sort_by(|a, b| {
                for key in &plan.sort {
                    let left = a.get(&key.field).unwrap_or(&Value::Null);
                    let right = b.get(&key.field).unwrap_or(&Value::Null);
                    let ord = match key.direction {
                        SortDirection::Ascending => eval::order(left, right),
                        SortDirection::Descending => eval::order(right, left),
                    };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let skip = plan.skip.unwrap_or(0) as usize;
        let take = plan.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| self.project(row, plan.select.as_ref()))
            .collect())
    }

    async fn insert(&self, attributes: Record) -> Result<Value, StoreError> {
        self.check_columns(&attributes)?;
        let mut rows = self.rows.write().await;

        let id = match attributes.id(&self.primary_key) {
            Some(id) => {
                if rows.iter().any(|row| self.is_key(row, id)) {
                    return Err(format!(
                        "UNIQUE constraint failed: {}.{}",
                        self.table, self.primary_key
                    )
                    .into());
                }
                if let Some(n) = id.as_i64() {
                    self.next_id.fetch_max(n + 1, Ordering::SeqCst);
                }
                id.clone()
            }
            None => Value::from(self.next_id.fetch_add(1, Ordering::SeqCst)),
        };

        let mut row = Record::new();
        for column in &self.columns {
            let value = if *column == self.primary_key {
                id.clone()
            } else {
                attributes
                    .get(column)
                    .or_else(|| self.defaults.get(column))
                    .cloned()
                    .unwrap_or(Value::Null)
            };
            row.insert(column.clone(), value);
        }

        rows.push(row);
        tracing::trace!(table = %self.table, %id, "inserted row");
        Ok(id)
    }

    async fn update(&self, id: &Value, changes: Record) -> Result<Record, StoreError> {
        self.check_columns(&changes)?;
        let mut rows = self.rows.write().await;

        let row = rows
            .iter_mut()
            .find(|row| self.is_key(row, id))
            .ok_or_else(|| format!("no row in {} with {} = {}", self.table, self.primary_key, id))?;

        for (column, value) in changes.into_inner() {
            if column != self.primary_key {
                row.insert(column, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, id: &Value) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !self.is_key(row, id));
        if rows.len() == before {
            return Err(format!("no row in {} with {} = {}", self.table, self.primary_key, id).into());
        }
        Ok(())
    }
}
