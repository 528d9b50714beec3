//! Timestamp stamping and id extraction for mutations

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::query::{Record, ID_FIELD};

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Current time as RFC 3339 UTC with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Insert: sets `created_at` and `updated_at` when the caller did not
pub fn stamp_insert(record: &mut Record, now: &str) {
    for field in [CREATED_AT, UPDATED_AT] {
        record
            .entry(field)
            .or_insert_with(|| Value::String(now.to_string()));
    }
}

/// Update: always refreshes `updated_at`; the key itself is immutable
pub fn stamp_update(patch: &mut Record, now: &str) {
    patch.remove(ID_FIELD);
    patch.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
}

/// Caller-supplied id of a record, if any
pub fn supplied_id(record: &Record) -> Option<String> {
    match record.get(ID_FIELD) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
