//! # Records and Result Shapes
//!
//! A [`Record`] is a flat attribute map with the primary key stored as a
//! regular field. Results come back either bare or wrapped in a [`Page`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};

/// A flat attribute map, field name to value. Field order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// The value stored under the primary-key field, if any.
    pub fn id(&self, primary_key: &str) -> Option<&Value> {
        self.0.get(primary_key).filter(|v| !v.is_null())
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// A copy of this record without `field`.
    pub fn without(&self, field: &str) -> Self {
        let mut copy = self.clone();
        copy.0.remove(field);
        copy
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Record {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Either a single item or a list of them.
///
/// `create` accepts both shapes; bulk `patch`/`remove` return `Many`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The pagination envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows matching the predicate, ignoring `$limit`/`$skip`.
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub data: Vec<T>,
}

/// What `find` returns: an envelope when pagination is on, else a bare list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindResult {
    Page(Page<Record>),
    All(Vec<Record>),
}

impl FindResult {
    /// The records, regardless of shape.
    pub fn data(&self) -> &[Record] {
        match self {
            Self::Page(page) => &page.data,
            Self::All(records) => records,
        }
    }

    pub fn into_data(self) -> Vec<Record> {
        match self {
            Self::Page(page) => page.data,
            Self::All(records) => records,
        }
    }
}

/// Which rows a mutating call applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// One row, resolved by primary key.
    Single(Value),
    /// Every row matching the query object.
    AllMatching(Map<String, Value>),
}

impl Target {
    pub fn single(id: impl Into<Value>) -> Self {
        Self::Single(id.into())
    }

    pub fn all() -> Self {
        Self::AllMatching(Map::new())
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::AllMatching(_))
    }
}
