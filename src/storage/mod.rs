//! Storage collaborator contract
//!
//! The core only needs "execute query text with named parameters, visit the
//! resulting rows". Row values are copied out of the cursor into owned
//! [`Value`]s so decoding stays independent of the backend.

pub mod sqlite;

pub use sqlite::{run_schema_migrations, SqliteStore};

use std::ops::ControlFlow;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

/// One result row, columns in select order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Integer(i64),
    TextList(Vec<String>),
}

/// Named query parameters (names without the backend's prefix character)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParams {
    named: Vec<(&'static str, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: ParamValue) -> Self {
        self.named.retain(|(existing, _)| *existing != name);
        self.named.push((name, value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.named
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.named.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Could not open or check out a connection
    Connection(String),
    /// Query preparation, binding or execution failed
    Query(String),
    /// The cursor failed while iterating rows
    Cursor(String),
    /// A schema file could not be read or applied
    Migration(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Connection(e) => write!(f, "Connection error: {}", e),
            StorageError::Query(e) => write!(f, "Query error: {}", e),
            StorageError::Cursor(e) => write!(f, "Cursor error: {}", e),
            StorageError::Migration(e) => write!(f, "Migration error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Parameterized query execution over the warehouse
///
/// `query` is blocking: it runs on a blocking worker, never on the async
/// executor. It calls `visit` once per row until the rows are exhausted or
/// `visit` returns `ControlFlow::Break`. The cursor must be released before
/// `query` returns, on every path.
pub trait QueryStore: Send + Sync {
    fn query(
        &self,
        query: &str,
        params: &QueryParams,
        visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
    ) -> Result<(), StorageError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
