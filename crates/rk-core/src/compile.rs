//! # Predicate Compiler
//!
//! Lowers a [`Predicate`] into calls on a [`QueryBuilder`]:
//!
//! - `field: scalar` emits `where(field, =, scalar)`
//! - `field: { $op: v, ... }` emits one call per operator, AND-combined
//! - `$or: [p1, p2, ...]` emits one OR-combined group, one branch per `pN`
//!
//! Unknown `$` keys and plain field names inside an operator object are
//! rejected rather than guessed at.

use crate::error::FilterError;
use crate::filter::{Predicate, OR_KEY};
use crate::operator::{Comparison, Operator};
use serde_json::{Map, Value};

/// Maximum `$or` nesting depth.
pub const MAX_DEPTH: usize = 16;

/// Callback that fills one branch of an OR group.
pub type BranchFn<'a> = dyn FnMut(usize, &mut dyn QueryBuilder) -> Result<(), FilterError> + 'a;

/// The relational builder capability the compiler drives.
///
/// Successive calls on the same builder are AND-combined.
pub trait QueryBuilder {
    fn where_cmp(&mut self, column: &str, op: Comparison, value: &Value);

    fn where_not(&mut self, column: &str, value: &Value);

    fn where_in(&mut self, column: &str, values: &[Value]);

    fn where_not_in(&mut self, column: &str, values: &[Value]);

    /// Open an OR-combined group of `branches` sub-clauses.
    ///
    /// `fill` is called once per branch with a fresh builder; calls on that
    /// builder are AND-combined within the branch. The group as a whole is
    /// AND-combined with the builder's other constraints.
    fn where_any(&mut self, branches: usize, fill: &mut BranchFn<'_>) -> Result<(), FilterError>;
}

/// Compile `predicate` onto `builder`. An empty predicate emits nothing.
pub fn compile(predicate: &Predicate, builder: &mut dyn QueryBuilder) -> Result<(), FilterError> {
    compile_fields(predicate.as_map(), builder, 0)
}

fn compile_fields(
    fields: &Map<String, Value>,
    builder: &mut dyn QueryBuilder,
    depth: usize,
) -> Result<(), FilterError> {
    if depth > MAX_DEPTH {
        return Err(FilterError::TooDeep(MAX_DEPTH));
    }

    for (key, value) in fields {
        if key == OR_KEY {
            compile_or(value, builder, depth)?;
            continue;
        }
        if key.starts_with('$') {
            return Err(FilterError::UnknownOperator(key.clone()));
        }
        match value {
            Value::Object(operators) => compile_operators(key, operators, builder)?,
            scalar => builder.where_cmp(key, Comparison::Eq, scalar),
        }
    }

    Ok(())
}

fn compile_or(
    value: &Value,
    builder: &mut dyn QueryBuilder,
    depth: usize,
) -> Result<(), FilterError> {
    let branches = value
        .as_array()
        .ok_or(FilterError::InvalidOr)?
        .iter()
        .map(|branch| branch.as_object().ok_or(FilterError::InvalidOr))
        .collect::<Result<Vec<_>, _>>()?;

    if branches.is_empty() {
        return Ok(());
    }

    builder.where_any(branches.len(), &mut |index: usize, group: &mut dyn QueryBuilder| {
        compile_fields(branches[index], group, depth + 1)
    })
}

/// `column: { $op: value, ... }`; the enclosing key is the column for every operator.
fn compile_operators(
    column: &str,
    operators: &Map<String, Value>,
    builder: &mut dyn QueryBuilder,
) -> Result<(), FilterError> {
    for (key, value) in operators {
        let op = match Operator::from_key(key) {
            Some(op) => op,
            None if key.starts_with('$') => return Err(FilterError::UnknownOperator(key.clone())),
            None => {
                return Err(FilterError::UnexpectedField {
                    column: column.to_string(),
                    field: key.clone(),
                })
            }
        };

        match op {
            Operator::Ne => builder.where_not(column, value),
            Operator::In => builder.where_in(column, expect_array(column, op, value)?),
            Operator::Nin => builder.where_not_in(column, expect_array(column, op, value)?),
            Operator::Like if !value.is_string() => {
                return Err(FilterError::ExpectedString {
                    column: column.to_string(),
                    operator: op.key(),
                })
            }
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte | Operator::Like => {
                if let Some(cmp) = op.comparison() {
                    builder.where_cmp(column, cmp, value);
                }
            }
        }
    }

    Ok(())
}

fn expect_array<'a>(column: &str, op: Operator, value: &'a Value) -> Result<&'a [Value], FilterError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| FilterError::ExpectedArray {
            column: column.to_string(),
            operator: op.key(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Records builder calls as text.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl QueryBuilder for Trace {
        fn where_cmp(&mut self, column: &str, op: Comparison, value: &Value) {
            self.0.push(format!("where {column} {op} {value}"));
        }
        fn where_not(&mut self, column: &str, value: &Value) {
            self.0.push(format!("whereNot {column} {value}"));
        }
        fn where_in(&mut self, column: &str, values: &[Value]) {
            self.0.push(format!("whereIn {column} {}", Value::from(values.to_vec())));
        }
        fn where_not_in(&mut self, column: &str, values: &[Value]) {
            self.0.push(format!("whereNotIn {column} {}", Value::from(values.to_vec())));
        }
        fn where_any(&mut self, branches: usize, fill: &mut BranchFn<'_>) -> Result<(), FilterError> {
            let mut parts = Vec::new();
            for i in 0..branches {
                let mut branch = Trace::default();
                fill(i, &mut branch)?;
                parts.push(format!("({})", branch.0.join(" and ")));
            }
            self.0.push(format!("any {}", parts.join(" or ")));
            Ok(())
        }
    }

    fn trace(value: Value) -> Result<Vec<String>, FilterError> {
        let predicate = Predicate::from(value.as_object().cloned().unwrap());
        let mut builder = Trace::default();
        compile(&predicate, &mut builder)?;
        Ok(builder.0)
    }

    #[test]
    fn test_empty_predicate_emits_nothing() {
        assert!(trace(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_scalars_are_equality() {
        assert_eq!(
            trace(json!({ "name": "Doug", "age": 32 })).unwrap(),
            vec![r#"where name = "Doug""#, "where age = 32"]
        );
    }

    #[test]
    fn test_operator_object_uses_field_as_column() {
        assert_eq!(
            trace(json!({ "price": { "$gt": 10, "$lt": 20 } })).unwrap(),
            vec!["where price > 10", "where price < 20"]
        );
    }

    #[test]
    fn test_dedicated_methods() {
        assert_eq!(
            trace(json!({
                "name": { "$ne": "Alice" },
                "age": { "$in": [1, 2], "$nin": [3] },
                "title": { "$like": "%lie%" },
            }))
            .unwrap(),
            vec![
                r#"whereNot name "Alice""#,
                "whereIn age [1,2]",
                "whereNotIn age [3]",
                r#"where title LIKE "%lie%""#,
            ]
        );
    }

    #[test]
    fn test_or_groups_branches() {
        assert_eq!(
            trace(json!({
                "$or": [{ "name": "Alice" }, { "name": "Bob", "age": { "$gte": 30 } }],
            }))
            .unwrap(),
            vec![r#"any (where name = "Alice") or (where name = "Bob" and where age >= 30)"#]
        );
        assert!(trace(json!({ "$or": [] })).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_ambiguous_keys() {
        assert_eq!(
            trace(json!({ "$where": "1 = 1" })).unwrap_err(),
            FilterError::UnknownOperator("$where".into())
        );
        assert_eq!(
            trace(json!({ "age": { "$between": [1, 2] } })).unwrap_err(),
            FilterError::UnknownOperator("$between".into())
        );
        assert_eq!(
            trace(json!({ "address": { "city": "Oslo" } })).unwrap_err(),
            FilterError::UnexpectedField { column: "address".into(), field: "city".into() }
        );
    }

    #[test]
    fn test_rejects_badly_typed_operands() {
        assert_eq!(trace(json!({ "$or": { "a": 1 } })).unwrap_err(), FilterError::InvalidOr);
        assert_eq!(trace(json!({ "$or": [1] })).unwrap_err(), FilterError::InvalidOr);
        assert_eq!(
            trace(json!({ "age": { "$in": 5 } })).unwrap_err(),
            FilterError::ExpectedArray { column: "age".into(), operator: "$in" }
        );
        assert_eq!(
            trace(json!({ "age": { "$like": 5 } })).unwrap_err(),
            FilterError::ExpectedString { column: "age".into(), operator: "$like" }
        );
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut value = json!({ "a": 1 });
        for _ in 0..=MAX_DEPTH {
            value = json!({ "$or": [value] });
        }
        assert_eq!(trace(value).unwrap_err(), FilterError::TooDeep(MAX_DEPTH));
    }
}
