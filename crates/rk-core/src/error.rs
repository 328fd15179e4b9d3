//! Errors raised while splitting or compiling a query object.

use thiserror::Error;

/// A query object that cannot be turned into a plan.
///
/// Every variant describes a caller mistake, so integrators usually surface
/// these as bad requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("query must be an object")]
    NotAnObject,

    #[error("unknown query operator '{0}'")]
    UnknownOperator(String),

    /// A plain field name inside another field's operator object.
    #[error("'{field}' is not an operator and cannot be nested under '{column}'")]
    UnexpectedField { column: String, field: String },

    #[error("'$or' expects an array of query objects")]
    InvalidOr,

    #[error("'{operator}' on '{column}' expects an array")]
    ExpectedArray {
        column: String,
        operator: &'static str,
    },

    #[error("'{operator}' on '{column}' expects a string")]
    ExpectedString {
        column: String,
        operator: &'static str,
    },

    #[error("'{0}' must be an integer")]
    InvalidNumber(&'static str),

    #[error("invalid sort direction for '{0}'")]
    InvalidSort(String),

    #[error("'$select' expects an array of field names")]
    InvalidSelect,

    #[error("query nesting exceeds {0} levels")]
    TooDeep(usize),
}
