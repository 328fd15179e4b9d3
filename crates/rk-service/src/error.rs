//! Service error kinds and the error hook.

use rk_core::FilterError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a storage collaborator.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

/// Translates errors at every operation boundary. The default returns the
/// error unchanged.
pub type ErrorHook = Arc<dyn Fn(ServiceError) -> ServiceError + Send + Sync>;

/// Coarse classification, stable across variants.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    NotFound,
    BadRequest,
    Storage,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing options or model at construction.
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Passed through from the model unmodified.
    #[error("{0}")]
    Storage(#[source] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BadRequest(_) | Self::Filter(_) => ErrorKind::BadRequest,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn storage(err: impl Into<StoreError>) -> Self {
        Self::Storage(err.into())
    }
}

pub(crate) fn identity_hook() -> ErrorHook {
    Arc::new(|err| err)
}
