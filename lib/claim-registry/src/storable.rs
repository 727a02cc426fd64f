//! Storable trait for database-agnostic storage operations.
//!
//! Types implementing `Storable` can be persisted by any row-oriented backend.
//! The trait carries the table metadata; values travel through serde.

/// Trait for types that can be stored in a database table.
///
/// # Column Naming
///
/// Database columns use snake_case. JSON serialization uses whatever serde is
/// configured for (camelCase for [`Item`](crate::Item)), so `json_keys()`
/// corresponds 1:1 with `columns()`.
pub trait Storable: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync {
    /// The database table name for this type.
    fn table_name() -> &'static str;

    /// Column names in order (snake_case for DB).
    fn columns() -> &'static [&'static str];

    /// Column types in order (database-agnostic).
    /// Used by executors to bind null values with the correct type.
    /// Values: "text", "datetime", "bigint", "integer", "boolean", "json"
    fn column_types() -> &'static [&'static str];

    /// JSON key names in order (camelCase for serde).
    fn json_keys() -> &'static [&'static str];

    /// Store-assigned primary key column. Omitted from inserts.
    fn key_column() -> &'static str;

    /// Column type for a column name, defaulting to "text".
    fn column_type(column: &str) -> &'static str {
        Self::columns()
            .iter()
            .position(|c| *c == column)
            .and_then(|idx| Self::column_types().get(idx).copied())
            .unwrap_or("text")
    }
}
