//! # Result Envelope
//!
//! Uniform `{data, error}` outcome returned by both executors. Callers
//! branch on the presence of `error` only; an empty `data` list is a
//! successful read, not a failure.

use serde::Serialize;

use crate::errors::{StoreError, StoreResult};
use crate::query::Record;

/// Machine-checkable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    BackendError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::BackendError => "backend_error",
        }
    }
}

/// Error half of an envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<StoreError> for ErrorInfo {
    fn from(err: StoreError) -> Self {
        Self {
            kind: err.kind(),
            code: err.code().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Data half of an envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Data {
    One(Record),
    Many(Vec<Record>),
}

/// `{data, error}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub data: Option<Data>,
    pub error: Option<ErrorInfo>,
}

impl ResultEnvelope {
    pub fn one(record: Record) -> Self {
        Self {
            data: Some(Data::One(record)),
            error: None,
        }
    }

    pub fn many(records: Vec<Record>) -> Self {
        Self {
            data: Some(Data::Many(records)),
            error: None,
        }
    }

    /// Successful call with no data (delete)
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn failure(err: StoreError) -> Self {
        Self {
            data: None,
            error: Some(err.into()),
        }
    }

    /// Wraps an executor outcome
    pub fn from_result(result: StoreResult<Option<Data>>) -> Self {
        match result {
            Ok(data) => Self { data, error: None },
            Err(err) => Self::failure(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// The single record, if the data holds exactly one
    pub fn record(&self) -> Option<&Record> {
        match &self.data {
            Some(Data::One(record)) => Some(record),
            _ => None,
        }
    }

    /// Every returned record, flattened; empty on error or delete
    pub fn records(&self) -> &[Record] {
        match &self.data {
            Some(Data::One(record)) => std::slice::from_ref(record),
            Some(Data::Many(records)) => records,
            None => &[],
        }
    }
}
