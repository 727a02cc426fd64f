//! Database-agnostic query builder.
//!
//! Backends translate these builders into their own dialect. The version
//! compare-and-swap used by item stores is an [`Update`] filtered on both the
//! key and the expected version.

use crate::{ItemId, Storable, StorageResult, Timestamp};
use async_trait::async_trait;
use std::marker::PhantomData;

/// A value that can be bound to a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    UInt(u64),
    Datetime(Timestamp),
    Null,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<ItemId> for Value {
    fn from(id: ItemId) -> Self {
        Value::Int(id.0)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Datetime(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Filter conditions for queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// field = value
    Eq(String, Value),
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A SELECT query builder.
#[derive(Debug, Clone)]
pub struct Query<T> {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<u64>,
    _marker: PhantomData<T>,
}

impl<T: Storable> Query<T> {
    /// Create a new query for the type's table.
    pub fn new() -> Self {
        Self {
            table: T::table_name().to_string(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            _marker: PhantomData,
        }
    }

    /// Add an equality filter.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl<T: Storable> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An INSERT builder. The executor returns the stored row, including
/// store-assigned columns.
#[derive(Debug, Clone)]
pub struct Insert<T> {
    pub table: String,
    pub values: Vec<(String, Value)>,
    _marker: PhantomData<T>,
}

impl<T: Storable> Insert<T> {
    pub fn new() -> Self {
        Self {
            table: T::table_name().to_string(),
            values: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }
}

impl<T: Storable> Default for Insert<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An UPDATE builder. Only rows matching every filter are written, which
/// makes a key + version filter an atomic compare-and-swap.
#[derive(Debug, Clone)]
pub struct Update<T> {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    pub filters: Vec<Filter>,
    _marker: PhantomData<T>,
}

impl<T: Storable> Update<T> {
    pub fn new() -> Self {
        Self {
            table: T::table_name().to_string(),
            assignments: Vec::new(),
            filters: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }
}

impl<T: Storable> Default for Update<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A DELETE query builder.
#[derive(Debug, Clone)]
pub struct Delete<T> {
    pub table: String,
    pub filters: Vec<Filter>,
    _marker: PhantomData<T>,
}

impl<T: Storable> Delete<T> {
    pub fn new() -> Self {
        Self {
            table: T::table_name().to_string(),
            filters: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }
}

impl<T: Storable> Default for Delete<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for executing queries against a database backend.
///
/// Implemented by database-specific pool types (e.g., `PgPool`).
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a SELECT query and return results.
    async fn fetch<T: Storable>(&self, query: Query<T>) -> StorageResult<Vec<T>>;

    /// Execute a SELECT query and return at most one result.
    async fn fetch_optional<T: Storable>(&self, query: Query<T>) -> StorageResult<Option<T>> {
        let results = self.fetch(query.limit(1)).await?;
        Ok(results.into_iter().next())
    }

    /// Check if any rows match the query (SELECT EXISTS).
    async fn exists<T: Storable>(&self, query: Query<T>) -> StorageResult<bool>;

    /// Insert a row and return it as stored.
    async fn insert<T: Storable>(&self, insert: Insert<T>) -> StorageResult<T>;

    /// Execute an UPDATE and return the rows it wrote.
    async fn update<T: Storable>(&self, update: Update<T>) -> StorageResult<Vec<T>>;

    /// Execute a DELETE query and return the number of rows affected.
    async fn delete<T: Storable>(&self, delete: Delete<T>) -> StorageResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Item;

    #[test]
    fn builders_target_the_item_table() {
        let query = Query::<Item>::new()
            .eq("id", ItemId(7))
            .order_by("id", Order::Asc)
            .limit(1);
        assert_eq!(query.table, "items");
        assert_eq!(query.filters, vec![Filter::Eq("id".into(), Value::Int(7))]);
        assert_eq!(query.limit, Some(1));

        let update = Update::<Item>::new()
            .set("claimed_by", None::<String>)
            .eq("id", ItemId(7))
            .eq("version", 3u64);
        assert_eq!(update.assignments, vec![("claimed_by".into(), Value::Null)]);
        assert_eq!(update.filters.len(), 2);
    }
}
