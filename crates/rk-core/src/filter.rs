//! # Query Filters
//!
//! Splits a caller's query object into result-shaping controls and the row
//! predicate:
//!
//! ```text
//! { "complete": false, "$sort": { "text": 1 }, "$limit": 10 }
//!   -> Filters   { sort: [text asc], limit: 10 }
//!   -> Predicate { "complete": false }
//! ```

use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OR_KEY: &str = "$or";

const SELECT_KEY: &str = "$select";
const SORT_KEY: &str = "$sort";
const LIMIT_KEY: &str = "$limit";
const SKIP_KEY: &str = "$skip";
/// Accepted and discarded; relation loading is not part of this layer.
const POPULATE_KEY: &str = "$populate";

// =============================================================================
// Pagination Policy
// =============================================================================

/// Pagination policy for a resource or a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginate {
    /// Page size used when the caller gives no `$limit`. `None` or `0`
    /// disables pagination.
    #[serde(default)]
    pub default: Option<u64>,
    /// Upper bound on any `$limit`.
    #[serde(default)]
    pub max: Option<u64>,
}

impl Paginate {
    pub fn new(default: u64, max: Option<u64>) -> Self {
        Self {
            default: Some(default),
            max,
        }
    }

    pub const fn disabled() -> Self {
        Self {
            default: None,
            max: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.default, Some(n) if n > 0)
    }

    /// Effective `$limit` for a request under this policy.
    pub fn resolve_limit(&self, requested: Option<u64>) -> Option<u64> {
        match self.default {
            Some(default) if default > 0 => {
                let lower = requested.unwrap_or(default);
                Some(self.max.map_or(lower, |max| lower.min(max)))
            }
            _ => requested,
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// The `$`-prefixed result-shaping controls of a query object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filters {
    pub select: Option<Vec<String>>,
    /// In the order the caller wrote them.
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

// =============================================================================
// Predicate
// =============================================================================

/// The row-filtering part of a query object: field to scalar (equality) or
/// field to operator object, plus an optional `$or` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(Map<String, Value>);

impl Predicate {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert; replaces any existing constraint on `field`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Predicate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// =============================================================================
// QueryFilter
// =============================================================================

/// A query object split into its two halves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub filters: Filters,
    pub predicate: Predicate,
}

impl QueryFilter {
    /// Split `query`, resolving `$limit` against `paginate` when given.
    pub fn parse(query: &Map<String, Value>, paginate: Option<&Paginate>) -> Result<Self, FilterError> {
        let mut filters = Filters::default();
        let mut predicate = Map::new();

        for (key, value) in query {
            match key.as_str() {
                SELECT_KEY => filters.select = parse_select(value)?,
                SORT_KEY => filters.sort = parse_sort(value)?,
                LIMIT_KEY => filters.limit = parse_count(value, LIMIT_KEY)?,
                SKIP_KEY => filters.skip = parse_count(value, SKIP_KEY)?,
                POPULATE_KEY => {}
                _ => {
                    predicate.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(paginate) = paginate {
            filters.limit = paginate.resolve_limit(filters.limit);
        }

        Ok(Self {
            filters,
            predicate: Predicate(predicate),
        })
    }

    /// Like [`QueryFilter::parse`] for an arbitrary JSON value.
    pub fn parse_value(query: &Value, paginate: Option<&Paginate>) -> Result<Self, FilterError> {
        match query {
            Value::Object(map) => Self::parse(map, paginate),
            Value::Null => Self::parse(&Map::new(), paginate),
            _ => Err(FilterError::NotAnObject),
        }
    }
}

fn parse_select(value: &Value) -> Result<Option<Vec<String>>, FilterError> {
    match value {
        Value::Null => Ok(None),
        Value::String(field) => Ok(Some(vec![field.clone()])),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(ToString::to_string)
                    .ok_or(FilterError::InvalidSelect)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        _ => Err(FilterError::InvalidSelect),
    }
}

fn parse_sort(value: &Value) -> Result<Vec<SortKey>, FilterError> {
    let fields = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(fields) => fields,
        _ => return Err(FilterError::InvalidSort(SORT_KEY.to_string())),
    };

    fields
        .iter()
        .map(|(field, direction)| {
            let n = parse_integer(direction).ok_or_else(|| FilterError::InvalidSort(field.clone()))?;
            Ok(SortKey {
                field: field.clone(),
                direction: if n == 1 {
                    SortDirection::Ascending
                } else {
                    SortDirection::Descending
                },
            })
        })
        .collect()
}

/// Non-negative count from a number or numeric string; the sign is dropped.
fn parse_count(value: &Value, key: &'static str) -> Result<Option<u64>, FilterError> {
    if value.is_null() {
        return Ok(None);
    }
    parse_integer(value)
        .map(|n| Some(n.unsigned_abs()))
        .ok_or(FilterError::InvalidNumber(key))
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
