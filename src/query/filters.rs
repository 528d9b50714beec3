//! Client-side predicate filtering
//!
//! Evaluates filter conditions against decoded records when the backing
//! store cannot push them down. Conditions combine with AND semantics, in
//! declared order. No type coercion: a range comparison between different
//! JSON types never matches.

use std::cmp::Ordering;

use serde_json::Value;

use super::condition::{FilterCondition, FilterOperator};
use super::sorter::ResultSorter;
use super::spec::Record;

/// Evaluates filter conditions against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a record matches all conditions
    pub fn matches(record: &Record, conditions: &[FilterCondition]) -> bool {
        conditions
            .iter()
            .all(|cond| Self::matches_condition(record, cond))
    }

    /// Keeps only the records matching every condition, preserving order
    pub fn retain(records: &mut Vec<Record>, conditions: &[FilterCondition]) {
        if conditions.is_empty() {
            return;
        }
        records.retain(|record| Self::matches(record, conditions));
    }

    /// Checks if a record matches a single condition
    fn matches_condition(record: &Record, cond: &FilterCondition) -> bool {
        let field_value = match record.get(&cond.field) {
            Some(v) => v,
            None => return false, // Missing field = no match
        };

        match cond.operator {
            FilterOperator::Eq => values_equal(field_value, &cond.value),
            FilterOperator::Neq => !values_equal(field_value, &cond.value),
            FilterOperator::Gt => Self::range(field_value, &cond.value, Ordering::is_gt),
            FilterOperator::Gte => Self::range(field_value, &cond.value, Ordering::is_ge),
            FilterOperator::Lt => Self::range(field_value, &cond.value, Ordering::is_lt),
            FilterOperator::Lte => Self::range(field_value, &cond.value, Ordering::is_le),
            FilterOperator::In => cond
                .members()
                .is_some_and(|members| members.iter().any(|m| values_equal(field_value, m))),
        }
    }

    /// Range comparison, only between values of the same JSON type
    fn range(actual: &Value, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
        let comparable = matches!(
            (actual, bound),
            (Value::Number(_), Value::Number(_))
                | (Value::String(_), Value::String(_))
                | (Value::Bool(_), Value::Bool(_))
        );
        comparable && accept(ResultSorter::compare_values(Some(actual), Some(bound)))
    }
}

/// Equality with integer/float unification (`1 == 1.0`)
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(xf), Some(yf)) => xf == yf,
            _ => x == y,
        },
        _ => a == b,
    }
}
