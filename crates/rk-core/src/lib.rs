//! # rk-core: Filters, Predicates and Plans
//!
//! The pure half of recordkit. A caller's query object is split into result
//! shaping controls ([`Filters`]) and a row [`Predicate`]. The predicate is
//! compiled against any [`QueryBuilder`], and the whole thing is assembled
//! into a [`QueryPlan`] pair: one unbounded plan for counting, one paginated
//! plan for fetching.
//!
//! Nothing here performs I/O. Storage collaborators execute plans, either by
//! walking the [`Clause`] tree or by rendering it with [`sql`].

pub mod clause;
pub mod compile;
pub mod error;
pub mod filter;
pub mod operator;
pub mod plan;
pub mod record;
pub mod sql;

pub use clause::Clause;
pub use compile::{compile, QueryBuilder, MAX_DEPTH};
pub use error::FilterError;
pub use filter::{Filters, Paginate, Predicate, QueryFilter, SortDirection, SortKey, OR_KEY};
pub use operator::{Comparison, Operator};
pub use plan::{assemble, QueryPlan, QueryPlans};
pub use record::{FindResult, OneOrMany, Page, Record, Target};
