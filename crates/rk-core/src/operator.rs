//! # Query Operators
//!
//! The closed set of `$`-prefixed operators a field may carry, and the
//! relational comparisons they lower to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An operator key inside a field's operator object, e.g. `{ "age": { "$gt": 10 } }`.
///
/// Only ever read from a query object by [`Operator::from_key`]; compiled
/// clauses carry a [`Comparison`] or a dedicated clause variant instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Ne,
    In,
    Nin,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Self::Ne,
        Self::In,
        Self::Nin,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Like,
    ];

    /// Look up an operator by its wire key (`"$gte"`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$ne" => Some(Self::Ne),
            "$in" => Some(Self::In),
            "$nin" => Some(Self::Nin),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$like" => Some(Self::Like),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Ne => "$ne",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Like => "$like",
        }
    }

    /// The generic comparison this operator lowers to.
    ///
    /// `None` for operators that have a dedicated builder method
    /// (`$ne`, `$in`, `$nin`).
    pub fn comparison(self) -> Option<Comparison> {
        match self {
            Self::Lt => Some(Comparison::Lt),
            Self::Lte => Some(Comparison::Lte),
            Self::Gt => Some(Comparison::Gt),
            Self::Gte => Some(Comparison::Gte),
            Self::Like => Some(Comparison::Like),
            Self::Ne | Self::In | Self::Nin => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A binary relational comparison, `column <op> value`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl Comparison {
    /// The SQL operator symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
