//! Advisory field selection
//!
//! Projection runs last. Wildcards and relational shorthand such as
//! `operator:operators(name)` are passed through untouched; expanding them
//! is the caller's job.

use super::spec::{Record, ID_FIELD};

/// Splits a select string on top-level commas.
///
/// Commas inside parentheses belong to a relational selector.
pub fn parse_selectors(columns: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in columns.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                push_selector(&mut selectors, &current);
                current.clear();
            }
            c => current.push(c),
        }
    }
    push_selector(&mut selectors, &current);

    selectors
}

fn push_selector(selectors: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        selectors.push(trimmed.to_string());
    }
}

/// True when the selector list cannot be applied as a plain projection
fn is_passthrough(selectors: &[String]) -> bool {
    selectors.is_empty()
        || selectors
            .iter()
            .any(|s| s == "*" || s.contains('(') || s.contains(':'))
}

/// Projects records onto the selected fields, always keeping `id`
pub fn project(records: Vec<Record>, selectors: Option<&[String]>) -> Vec<Record> {
    match selectors {
        None => records,
        Some(fields) if is_passthrough(fields) => records,
        Some(fields) => records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .filter(|(k, _)| k == ID_FIELD || fields.iter().any(|f| f == k))
                    .collect()
            })
            .collect(),
    }
}
