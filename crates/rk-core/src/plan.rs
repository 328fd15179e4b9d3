//! # Query Assembly
//!
//! Combines projection, the compiled predicate, ordering and pagination into
//! executable plans. Every find produces two: an unbounded plan that the
//! storage layer counts, and a paginated plan that it fetches.

use crate::clause::Clause;
use crate::error::FilterError;
use crate::filter::{QueryFilter, SortKey};
use serde::Serialize;

/// One executable query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
    /// Projected columns, primary key first. `None` selects every column.
    pub select: Option<Vec<String>>,
    pub clause: Clause,
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// The count/fetch pair for one find.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlans {
    /// Same constraints with no limit or offset; used for `total`.
    pub unbounded: QueryPlan,
    /// `None` when `$limit` is `0`: the page is empty without querying.
    pub paginated: Option<QueryPlan>,
}

/// Assemble the plans for `query` against a table keyed by `primary_key`.
pub fn assemble(primary_key: &str, query: &QueryFilter) -> Result<QueryPlans, FilterError> {
    let filters = &query.filters;

    let select = filters.select.as_ref().map(|fields| {
        let mut columns = vec![primary_key.to_string()];
        for field in fields {
            if !columns.contains(field) {
                columns.push(field.clone());
            }
        }
        columns
    });

    let unbounded = QueryPlan {
        select,
        clause: Clause::compile(&query.predicate)?,
        sort: filters.sort.clone(),
        limit: None,
        skip: None,
    };

    let paginated = match filters.limit {
        Some(0) => None,
        limit => Some(QueryPlan {
            limit,
            skip: filters.skip.filter(|&skip| skip > 0),
            ..unbounded.clone()
        }),
    };

    tracing::trace!(?unbounded, ?paginated, "assembled query plans");

    Ok(QueryPlans {
        unbounded,
        paginated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortDirection;
    use crate::operator::Comparison;
    use serde_json::{json, Value};

    fn plans(value: Value) -> QueryPlans {
        let query = QueryFilter::parse(value.as_object().unwrap(), None).unwrap();
        assemble("id", &query).unwrap()
    }

    #[test]
    fn test_select_always_includes_primary_key() {
        let p = plans(json!({ "$select": ["name", "id", "age"] }));
        assert_eq!(
            p.unbounded.select,
            Some(vec!["id".to_string(), "name".to_string(), "age".to_string()])
        );
        assert_eq!(plans(json!({})).unbounded.select, None);
    }

    #[test]
    fn test_unbounded_drops_pagination() {
        let p = plans(json!({ "name": "a", "$sort": { "age": -1 }, "$limit": 2, "$skip": 4 }));
        assert_eq!(p.unbounded.limit, None);
        assert_eq!(p.unbounded.skip, None);
        assert_eq!(
            p.unbounded.sort,
            vec![SortKey { field: "age".into(), direction: SortDirection::Descending }]
        );

        let page = p.paginated.unwrap();
        assert_eq!(page.limit, Some(2));
        assert_eq!(page.skip, Some(4));
        assert_eq!(page.clause, p.unbounded.clause);
        assert_eq!(
            page.clause,
            Clause::All {
                clauses: vec![Clause::Compare {
                    column: "name".into(),
                    op: Comparison::Eq,
                    value: json!("a"),
                }],
            }
        );
    }

    #[test]
    fn test_zero_limit_short_circuits() {
        let p = plans(json!({ "$limit": 0, "age": { "$gt": 1 } }));
        assert!(p.paginated.is_none());
        assert!(!p.unbounded.clause.is_empty());
    }

    #[test]
    fn test_zero_skip_is_not_applied() {
        let p = plans(json!({ "$skip": 0 }));
        assert_eq!(p.paginated.unwrap().skip, None);
    }

    #[test]
    fn test_invalid_predicate_fails_assembly() {
        let query = QueryFilter::parse(json!({ "$nope": 1 }).as_object().unwrap(), None).unwrap();
        assert_eq!(
            assemble("id", &query).unwrap_err(),
            FilterError::UnknownOperator("$nope".into())
        );
    }
}
