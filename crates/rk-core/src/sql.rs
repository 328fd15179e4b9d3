//! # SQL Rendering
//!
//! Renders plans as parameterised SQL for relational collaborators.
//! Identifiers are double-quoted and values are bound through `?`
//! placeholders, in order.

use crate::clause::Clause;
use crate::compile::{BranchFn, QueryBuilder};
use crate::error::FilterError;
use crate::filter::SortDirection;
use crate::operator::Comparison;
use crate::plan::QueryPlan;
use serde_json::Value;

/// A statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// `SELECT` for `plan`, including ordering and pagination.
pub fn select(table: &str, plan: &QueryPlan) -> Result<SqlStatement, FilterError> {
    let columns = match &plan.select {
        Some(columns) => columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
        None => "*".to_string(),
    };

    let mut sql = format!("SELECT {} FROM {}", columns, quote(table));
    let params = push_where(&mut sql, &plan.clause)?;

    if !plan.sort.is_empty() {
        let order = plan
            .sort
            .iter()
            .map(|key| {
                let dir = match key.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                format!("{} {}", quote(&key.field), dir)
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }

    match (plan.limit, plan.skip) {
        (Some(limit), Some(skip)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, skip)),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
        // SQLite and MySQL need a LIMIT before OFFSET.
        (None, Some(skip)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", skip)),
        (None, None) => {}
    }

    Ok(SqlStatement { sql, params })
}

/// `SELECT COUNT(*)` over the plan's predicate. Projection, ordering and
/// pagination do not affect a count and are left out.
pub fn count(table: &str, plan: &QueryPlan) -> Result<SqlStatement, FilterError> {
    let mut sql = format!("SELECT COUNT(*) AS \"count\" FROM {}", quote(table));
    let params = push_where(&mut sql, &plan.clause)?;
    Ok(SqlStatement { sql, params })
}

fn push_where(sql: &mut String, clause: &Clause) -> Result<Vec<Value>, FilterError> {
    let mut condition = SqlWhere::default();
    clause.replay(&mut condition)?;
    let (text, params) = condition.finish();
    if let Some(text) = text {
        sql.push_str(" WHERE ");
        sql.push_str(&text);
    }
    Ok(params)
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// A [`QueryBuilder`] that writes a SQL boolean expression.
#[derive(Debug, Default)]
pub struct SqlWhere {
    parts: Vec<String>,
    params: Vec<Value>,
}

impl SqlWhere {
    /// The AND-joined expression (`None` when unconstrained) and its params.
    pub fn finish(self) -> (Option<String>, Vec<Value>) {
        let text = if self.parts.is_empty() {
            None
        } else {
            Some(self.parts.join(" AND "))
        };
        (text, self.params)
    }

    fn bind_list(&mut self, values: &[Value]) -> String {
        self.params.extend(values.iter().cloned());
        vec!["?"; values.len()].join(", ")
    }
}

impl QueryBuilder for SqlWhere {
    fn where_cmp(&mut self, column: &str, op: Comparison, value: &Value) {
        if value.is_null() && op == Comparison::Eq {
            self.parts.push(format!("{} IS NULL", quote(column)));
            return;
        }
        self.parts.push(format!("{} {} ?", quote(column), op.symbol()));
        self.params.push(value.clone());
    }

    fn where_not(&mut self, column: &str, value: &Value) {
        if value.is_null() {
            self.parts.push(format!("{} IS NOT NULL", quote(column)));
            return;
        }
        self.parts.push(format!("{} <> ?", quote(column)));
        self.params.push(value.clone());
    }

    fn where_in(&mut self, column: &str, values: &[Value]) {
        if values.is_empty() {
            self.parts.push("1 = 0".to_string());
            return;
        }
        let placeholders = self.bind_list(values);
        self.parts.push(format!("{} IN ({})", quote(column), placeholders));
    }

    fn where_not_in(&mut self, column: &str, values: &[Value]) {
        if values.is_empty() {
            self.parts.push("1 = 1".to_string());
            return;
        }
        let placeholders = self.bind_list(values);
        self.parts.push(format!("{} NOT IN ({})", quote(column), placeholders));
    }

    fn where_any(&mut self, branches: usize, fill: &mut BranchFn<'_>) -> Result<(), FilterError> {
        let mut rendered = Vec::with_capacity(branches);
        for index in 0..branches {
            let mut branch = SqlWhere::default();
            fill(index, &mut branch)?;
            let (text, params) = branch.finish();
            rendered.push(format!("({})", text.unwrap_or_else(|| "1 = 1".to_string())));
            self.params.extend(params);
        }
        self.parts.push(format!("({})", rendered.join(" OR ")));
        Ok(())
    }
}
