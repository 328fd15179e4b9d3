//! # rk-service: Record Services
//!
//! [`RecordService`] exposes find/get/create/patch/update/remove over a
//! storage [`Model`]. Queries are compiled by `rk-core`; the model executes
//! the resulting plans and persists rows.
//!
//! [`MemoryModel`] is an in-process table implementing [`Model`], used by the
//! hub and by tests.

pub mod error;
pub mod eval;
pub mod memory;
pub mod model;
pub mod service;

pub use error::{ErrorHook, ErrorKind, Result, ServiceError, StoreError};
pub use memory::MemoryModel;
pub use model::Model;
pub use service::{compute_replacement, Params, RecordService, ServiceOptions};

pub use rk_core::{FindResult, OneOrMany, Page, Paginate, Record, Target};
