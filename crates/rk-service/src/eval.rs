//! # Clause Evaluation
//!
//! Evaluates compiled [`Clause`] trees against in-memory rows with SQL
//! semantics: a missing column reads as `NULL`, and `NULL` only matches
//! `IS NULL` / `IS NOT NULL` tests.

use regex::RegexBuilder;
use rk_core::{Clause, Comparison, Record};
use serde_json::Value;
use std::cmp::Ordering;

/// True if `row` satisfies `clause`.
pub fn matches(clause: &Clause, row: &Record) -> bool {
    match clause {
        Clause::All { clauses } => clauses.iter().all(|c| matches(c, row)),
        Clause::Any { branches } => branches.iter().any(|c| matches(c, row)),
        Clause::Compare { column, op, value } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            compare(cell, *op, value)
        }
        Clause::NotEqual { column, value } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            match (cell, value) {
                (_, Value::Null) => !cell.is_null(),
                (Value::Null, _) => false,
                _ => !values_equal(cell, value),
            }
        }
        Clause::In { column, values } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            !cell.is_null() && values.iter().any(|v| values_equal(cell, v))
        }
        Clause::NotIn { column, values } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            if values.is_empty() {
                return true;
            }
            !cell.is_null() && !values.iter().any(|v| values_equal(cell, v))
        }
    }
}

fn compare(cell: &Value, op: Comparison, value: &Value) -> bool {
    if op == Comparison::Eq && value.is_null() {
        return cell.is_null();
    }
    if cell.is_null() || value.is_null() {
        return false;
    }

    match op {
        Comparison::Eq => values_equal(cell, value),
        Comparison::Lt => order(cell, value) == Ordering::Less,
        Comparison::Lte => order(cell, value) != Ordering::Greater,
        Comparison::Gt => order(cell, value) == Ordering::Greater,
        Comparison::Gte => order(cell, value) != Ordering::Less,
        Comparison::Like => like(&value_to_string(cell), &value_to_string(value)),
    }
}

/// SQL `LIKE`: `%` is any run, `_` is one character, case-insensitive.
pub fn like(text: &str, pattern: &str) -> bool {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    // Try numeric comparison first
    if let (Some(an), Some(bn)) = (value_to_f64(a), value_to_f64(b)) {
        return an == bn;
    }
    // Fall back to string comparison
    value_to_string(a) == value_to_string(b)
}

/// Total order used for comparisons and `ORDER BY`: nulls first, then
/// numbers, then text, then anything else by its JSON text.
pub fn order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => match (value_to_f64(a), value_to_f64(b)) {
            (Some(an), Some(bn)) => an.partial_cmp(&bn).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => value_to_string(a).cmp(&value_to_string(b)),
        },
    }
}

/// Numeric reading of a cell. Text only counts when it spells a finite
/// number, so "NaN" and "inf" stay text.
fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_core::Predicate;
    use serde_json::json;

    fn row(value: Value) -> Record {
        Record::from(value.as_object().cloned().unwrap())
    }

    fn check(predicate: Value, record: &Record) -> bool {
        let predicate = Predicate::from(predicate.as_object().cloned().unwrap());
        matches(&Clause::compile(&predicate).unwrap(), record)
    }

    #[test]
    fn test_like_patterns() {
        assert!(like("Charlie Brown", "%lie%"));
        assert!(like("charlie", "CHAR%"));
        assert!(like("cat", "c_t"));
        assert!(!like("cart", "c_t"));
        assert!(like("100% done", "100% done"));
        assert!(like("a.b", "a.b"));
        assert!(!like("axb", "a.b"));
    }

    #[test]
    fn test_comparisons() {
        let r = row(json!({ "id": 1, "name": "Doug", "age": 32, "created": true }));
        assert!(check(json!({ "age": 32 }), &r));
        assert!(check(json!({ "age": "32" }), &r));
        assert!(check(json!({ "age": { "$gt": 30, "$lte": 32 } }), &r));
        assert!(!check(json!({ "age": { "$lt": 32 } }), &r));
        assert!(check(json!({ "name": { "$ne": "Alice" } }), &r));
        assert!(check(json!({ "name": { "$in": ["Alice", "Doug"] } }), &r));
        assert!(!check(json!({ "name": { "$nin": ["Doug"] } }), &r));
        assert!(check(json!({ "created": true }), &r));
        assert!(check(json!({ "name": { "$like": "d%" } }), &r));
    }

    #[test]
    fn test_null_semantics() {
        let r = row(json!({ "id": 1, "age": null }));
        assert!(check(json!({ "age": null }), &r));
        assert!(check(json!({ "missing": null }), &r));
        assert!(!check(json!({ "age": { "$ne": null } }), &r));
        assert!(!check(json!({ "age": { "$ne": 3 } }), &r));
        assert!(!check(json!({ "age": { "$gt": 0 } }), &r));
        assert!(!check(json!({ "age": { "$in": [null] } }), &r));
        assert!(check(json!({ "age": { "$nin": [] } }), &r));
    }

    #[test]
    fn test_or_is_union_of_branches() {
        let rows = vec![
            row(json!({ "id": 1, "name": "Alice", "age": 19 })),
            row(json!({ "id": 2, "name": "Bob", "age": 25 })),
            row(json!({ "id": 3, "name": "Doug", "age": 32 })),
        ];
        let pred = json!({ "$or": [{ "name": "Alice" }, { "age": { "$gte": 30 } }] });
        let ids: Vec<_> = rows.iter().filter(|r| check(pred.clone(), r)).map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3)]);

        let mixed = json!({ "age": { "$lt": 30 }, "$or": [{ "name": "Alice" }, { "name": "Doug" }] });
        let ids: Vec<_> = rows.iter().filter(|r| check(mixed.clone(), r)).map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1)]);
    }

    #[test]
    fn test_float_words_compare_as_text() {
        for name in ["Nan", "NaN", "inf", "Infinity", "-inf"] {
            let r = row(json!({ "id": 1, "name": name }));
            assert!(check(json!({ "name": name }), &r), "{name} should equal itself");
            assert!(!check(json!({ "name": { "$ne": name } }), &r), "{name} $ne itself");
            assert!(check(json!({ "name": { "$in": [name] } }), &r));
            assert!(!check(json!({ "name": { "$nin": [name] } }), &r));
        }
        assert!(values_equal(&json!("NaN"), &json!("NaN")));
        assert!(!values_equal(&json!("NaN"), &json!("nan")));
        assert!(values_equal(&json!(0.1), &json!("0.1")));
        assert!(!values_equal(&json!(1), &json!(1.0000001)));
    }

    #[test]
    fn test_order_puts_nulls_first() {
        let mut values = vec![json!("b"), json!(2), Value::Null, json!("a"), json!(1)];
        values.sort_by(order);
        assert_eq!(values, vec![Value::Null, json!(1), json!(2), json!("a"), json!("b")]);
    }
}
