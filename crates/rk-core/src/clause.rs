//! # Clause Trees
//!
//! A compiled predicate kept as data. Plans carry a [`Clause`] so storage
//! collaborators can evaluate it directly or replay it into their own
//! [`QueryBuilder`].

use crate::compile::{self, BranchFn, QueryBuilder};
use crate::error::FilterError;
use crate::filter::Predicate;
use crate::operator::Comparison;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Clause {
    /// Conjunction; an empty list matches every row.
    All { clauses: Vec<Clause> },
    /// Disjunction of branches.
    Any { branches: Vec<Clause> },
    Compare {
        column: String,
        op: Comparison,
        value: Value,
    },
    NotEqual { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    NotIn { column: String, values: Vec<Value> },
}

impl Default for Clause {
    fn default() -> Self {
        Self::All {
            clauses: Vec::new(),
        }
    }
}

impl Clause {
    /// Compile `predicate` into a tree rooted at [`Clause::All`].
    pub fn compile(predicate: &Predicate) -> Result<Self, FilterError> {
        let mut builder = ClauseBuilder::default();
        compile::compile(predicate, &mut builder)?;
        Ok(builder.finish())
    }

    /// True when the clause places no constraint on rows.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All { clauses } => clauses.iter().all(Clause::is_empty),
            _ => false,
        }
    }

    /// Re-emit this clause as builder calls.
    pub fn replay(&self, builder: &mut dyn QueryBuilder) -> Result<(), FilterError> {
        match self {
            Self::All { clauses } => {
                for clause in clauses {
                    clause.replay(builder)?;
                }
                Ok(())
            }
            Self::Any { branches } => {
                builder.where_any(branches.len(), &mut |index: usize, group: &mut dyn QueryBuilder| {
                    branches[index].replay(group)
                })
            }
            Self::Compare { column, op, value } => {
                builder.where_cmp(column, *op, value);
                Ok(())
            }
            Self::NotEqual { column, value } => {
                builder.where_not(column, value);
                Ok(())
            }
            Self::In { column, values } => {
                builder.where_in(column, values);
                Ok(())
            }
            Self::NotIn { column, values } => {
                builder.where_not_in(column, values);
                Ok(())
            }
        }
    }
}

/// A [`QueryBuilder`] that records calls as a [`Clause`] tree.
#[derive(Debug, Default)]
pub struct ClauseBuilder {
    clauses: Vec<Clause>,
}

impl ClauseBuilder {
    pub fn finish(self) -> Clause {
        Clause::All {
            clauses: self.clauses,
        }
    }
}

impl QueryBuilder for ClauseBuilder {
    fn where_cmp(&mut self, column: &str, op: Comparison, value: &Value) {
        self.clauses.push(Clause::Compare {
            column: column.to_string(),
            op,
            value: value.clone(),
        });
    }

    fn where_not(&mut self, column: &str, value: &Value) {
        self.clauses.push(Clause::NotEqual {
            column: column.to_string(),
            value: value.clone(),
        });
    }

    fn where_in(&mut self, column: &str, values: &[Value]) {
        self.clauses.push(Clause::In {
            column: column.to_string(),
            values: values.to_vec(),
        });
    }

    fn where_not_in(&mut self, column: &str, values: &[Value]) {
        self.clauses.push(Clause::NotIn {
            column: column.to_string(),
            values: values.to_vec(),
        });
    }

    fn where_any(&mut self, branches: usize, fill: &mut BranchFn<'_>) -> Result<(), FilterError> {
        let mut built = Vec::with_capacity(branches);
        for index in 0..branches {
            let mut branch = ClauseBuilder::default();
            fill(index, &mut branch)?;
            built.push(branch.finish());
        }
        self.clauses.push(Clause::Any { branches: built });
        Ok(())
    }
}
