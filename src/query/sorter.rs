//! Record sorting
//!
//! One comparator shared by the tree store's native child order, the
//! document store's native order, and the client-side chunk merge, so that
//! a merged result is ordered exactly like a single native query.

use std::cmp::Ordering;

use serde_json::Value;

use super::condition::{OrderCondition, SortDirection};
use super::spec::{Record, ID_FIELD};

/// Sorts records
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts records by the given keys, primary first.
    ///
    /// Sort is stable: records equal on every key keep their input order.
    pub fn sort(records: &mut [Record], orderings: &[OrderCondition]) {
        if orderings.is_empty() {
            return;
        }
        records.sort_by(|a, b| Self::compare_records(a, b, orderings));
    }

    /// Sorts records by the given keys, breaking ties by `id`.
    ///
    /// The id tie-break follows the direction of the last key, ascending
    /// when no key is given. Document store native order.
    pub fn sort_with_id_tiebreak(records: &mut [Record], orderings: &[OrderCondition]) {
        records.sort_by(|a, b| Self::compare_with_id_tiebreak(a, b, orderings));
    }

    /// Compares two records key by key
    pub fn compare_records(a: &Record, b: &Record, orderings: &[OrderCondition]) -> Ordering {
        orderings
            .iter()
            .map(|order| {
                let ordering = Self::compare_values(a.get(&order.field), b.get(&order.field));
                match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// [`Self::compare_records`] followed by the `id` tie-break
    pub fn compare_with_id_tiebreak(
        a: &Record,
        b: &Record,
        orderings: &[OrderCondition],
    ) -> Ordering {
        Self::compare_records(a, b, orderings).then_with(|| {
            let by_id = Self::compare_values(a.get(ID_FIELD), b.get(ID_FIELD));
            match orderings.last().map(|o| o.direction) {
                Some(SortDirection::Desc) => by_id.reverse(),
                _ => by_id,
            }
        })
    }

    /// Compares two JSON values for sorting.
    ///
    /// Ordering rules:
    /// - missing < null < bool < number < string < array < object
    /// - For same types, natural ordering
    pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => {
                let a_type = type_rank(a_val);
                let b_type = type_rank(b_val);

                if a_type != b_type {
                    return a_type.cmp(&b_type);
                }

                match (a_val, b_val) {
                    (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                    (Value::Number(a_n), Value::Number(b_n)) => {
                        let a_f = a_n.as_f64().unwrap_or(0.0);
                        let b_f = b_n.as_f64().unwrap_or(0.0);
                        a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                    }
                    (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
                    _ => Ordering::Equal, // Null, arrays and objects not compared
                }
            }
        }
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
