//! # Query Spec
//!
//! The accumulated, not-yet-executed description of one read or mutation.
//! Builder methods are pure state changes: they perform no I/O and cannot
//! fail. A spec is consumed exactly once by an executor.

use serde::Serialize;
use serde_json::{Map, Value};

use super::condition::{FilterCondition, FilterOperator, OrderCondition};
use super::select::parse_selectors;

/// A record: field name to value, always carrying [`ID_FIELD`] once stored.
pub type Record = Map<String, Value>;

/// Name of the key field attached to every record
pub const ID_FIELD: &str = "id";

/// Records to insert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InsertPayload {
    One(Record),
    Many(Vec<Record>),
}

impl InsertPayload {
    /// Flattens the payload into a list of records
    pub fn into_records(self) -> Vec<Record> {
        match self {
            InsertPayload::One(record) => vec![record],
            InsertPayload::Many(records) => records,
        }
    }

    /// True when the caller passed a single record
    pub fn is_single(&self) -> bool {
        matches!(self, InsertPayload::One(_))
    }
}

impl From<Record> for InsertPayload {
    fn from(record: Record) -> Self {
        InsertPayload::One(record)
    }
}

impl From<Vec<Record>> for InsertPayload {
    fn from(records: Vec<Record>) -> Self {
        InsertPayload::Many(records)
    }
}

/// Mutation carried by a spec; at most one per spec
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Insert(InsertPayload),
    Update(Record),
    Delete,
}

/// Kind of work a spec describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Read,
    Insert,
    Update,
    Delete,
}

impl SpecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecKind::Read => "read",
            SpecKind::Insert => "insert",
            SpecKind::Update => "update",
            SpecKind::Delete => "delete",
        }
    }
}

/// Accumulated query state for one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    pub collection: String,
    pub filters: Vec<FilterCondition>,
    pub orderings: Vec<OrderCondition>,
    pub limit: Option<usize>,
    pub select_fields: Option<Vec<String>>,
    pub single: bool,
    pub mutation: Option<Mutation>,
}

impl QuerySpec {
    /// Starts an empty read of `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            orderings: Vec::new(),
            limit: None,
            select_fields: None,
            single: false,
            mutation: None,
        }
    }

    /// Sets the advisory field selection, e.g. `"id, name, operator:operators(name)"`
    pub fn select(mut self, columns: &str) -> Self {
        self.select_fields = Some(parse_selectors(columns));
        self
    }

    /// Appends a filter condition
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterCondition::new(field, FilterOperator::Eq, value.into()))
    }

    pub fn neq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterCondition::new(field, FilterOperator::Neq, value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterCondition::new(field, FilterOperator::Gt, value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterCondition::new(field, FilterOperator::Gte, value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterCondition::new(field, FilterOperator::Lt, value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterCondition::new(field, FilterOperator::Lte, value.into()))
    }

    /// Membership filter. An empty list is recorded as-is and makes the
    /// whole spec unsatisfiable.
    pub fn in_list<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(FilterCondition::in_list(field, values))
    }

    /// Appends an ordering key; keys apply in declaration order
    pub fn order(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.orderings.push(OrderCondition::new(field, ascending));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Requests exactly one record; forces `limit = 1`
    pub fn single(mut self) -> Self {
        self.single = true;
        self.limit = Some(1);
        self
    }

    pub fn insert(mut self, payload: impl Into<InsertPayload>) -> Self {
        self.mutation = Some(Mutation::Insert(payload.into()));
        self
    }

    pub fn update(mut self, patch: Record) -> Self {
        self.mutation = Some(Mutation::Update(patch));
        self
    }

    pub fn delete(mut self) -> Self {
        self.mutation = Some(Mutation::Delete);
        self
    }

    pub fn kind(&self) -> SpecKind {
        match &self.mutation {
            None => SpecKind::Read,
            Some(Mutation::Insert(_)) => SpecKind::Insert,
            Some(Mutation::Update(_)) => SpecKind::Update,
            Some(Mutation::Delete) => SpecKind::Delete,
        }
    }

    /// True when an empty `in` filter guarantees an empty match set
    pub fn is_unsatisfiable(&self) -> bool {
        self.filters.iter().any(FilterCondition::is_unsatisfiable)
    }

    /// The read-only part of this spec, used to discover mutation targets
    pub fn read_part(&self) -> QuerySpec {
        QuerySpec {
            collection: self.collection.clone(),
            filters: self.filters.clone(),
            orderings: self.orderings.clone(),
            limit: self.limit,
            select_fields: None,
            single: false,
            mutation: None,
        }
    }
}
