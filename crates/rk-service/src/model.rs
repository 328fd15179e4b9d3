//! # Storage Model
//!
//! The collaborator that owns persistence. A [`Model`] executes compiled
//! [`QueryPlan`]s and writes rows addressed by primary key; the service never
//! touches storage any other way.

use crate::error::StoreError;
use rk_core::{QueryPlan, Record};
use serde_json::Value;

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    /// Number of rows matching the plan's clause. Pagination is ignored.
    async fn count(&self, plan: &QueryPlan) -> Result<u64, StoreError>;

    /// Rows matching the plan, projected, ordered and paginated.
    async fn fetch_all(&self, plan: &QueryPlan) -> Result<Vec<Record>, StoreError>;

    /// Insert a row and return its primary key.
    async fn insert(&self, attributes: Record) -> Result<Value, StoreError>;

    /// Write `changes` onto the row with primary key `id`. Fields absent from
    /// `changes` are left as stored. Returns the stored row.
    async fn update(&self, id: &Value, changes: Record) -> Result<Record, StoreError>;

    /// Delete the row with primary key `id`.
    async fn delete(&self, id: &Value) -> Result<(), StoreError>;
}
