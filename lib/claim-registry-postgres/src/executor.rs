//! PostgreSQL implementation of QueryExecutor.

pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

use async_trait::async_trait;
use claim_registry::{
    Delete, Filter, Insert, Order, Query, QueryExecutor, Storable, StorageResult, StoreError,
    Update, Value,
};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{Arguments, Postgres};
use tracing::debug;

use crate::deserialize_row;

/// Wrapper around sqlx::PgPool that implements QueryExecutor.
#[derive(Clone, Debug)]
pub struct PgPool(sqlx::PgPool);

impl PgPool {
    /// Connect to a PostgreSQL database with at most `max_connections` open.
    pub async fn connect_with(url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(unavailable)?;
        Ok(Self(pool))
    }

    /// Get the inner sqlx::PgPool.
    pub fn inner(&self) -> &sqlx::PgPool {
        &self.0
    }
}

pub(crate) fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Build a WHERE clause from filters, numbering parameters from `start_param`.
fn build_where_clause(filters: &[Filter], start_param: usize) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(offset, filter)| match filter {
            Filter::Eq(field, _) => format!("{} = ${}", field, start_param + offset),
        })
        .collect();

    format!(" WHERE {}", clauses.join(" AND "))
}

/// Bind filter values to PgArguments.
fn bind_filters<T: Storable>(args: &mut PgArguments, filters: &[Filter]) -> StorageResult<()> {
    for filter in filters {
        match filter {
            Filter::Eq(field, value) => bind_value(args, value, T::column_type(field))?,
        }
    }
    Ok(())
}

/// Bind a Value to PgArguments. `col_type` picks the SQL type of a null.
fn bind_value(args: &mut PgArguments, value: &Value, col_type: &str) -> StorageResult<()> {
    let added = match value {
        Value::String(s) => args.add(s.as_str()),
        Value::Int(n) => args.add(*n),
        Value::UInt(n) => {
            // PostgreSQL doesn't have unsigned, use i64
            let n = i64::try_from(*n)
                .map_err(|_| StoreError::Corrupt(format!("{n} does not fit in BIGINT")))?;
            args.add(n)
        }
        Value::Datetime(ts) => args.add(*ts.inner()),
        Value::Null => match col_type {
            "datetime" => args.add(None::<chrono::DateTime<chrono::Utc>>),
            "bigint" => args.add(None::<i64>),
            _ => args.add(None::<String>),
        },
    };
    added.map_err(|e| StoreError::Unavailable(e.to_string()))
}

/// Build ORDER BY clause.
fn build_order_clause(order_by: &[(String, Order)]) -> String {
    if order_by.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = order_by
        .iter()
        .map(|(field, order)| {
            let dir = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            format!("{} {}", field, dir)
        })
        .collect();

    format!(" ORDER BY {}", clauses.join(", "))
}

fn build_insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn build_update_sql(table: &str, columns: &[&str], filters: &[Filter]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("{} = ${}", column, idx + 1))
        .collect();
    format!(
        "UPDATE {} SET {}{} RETURNING *",
        table,
        assignments.join(", "),
        build_where_clause(filters, columns.len() + 1)
    )
}

/// Run an INSERT on any executor, a pool or an open transaction.
pub(crate) async fn insert_with<'e, E, T>(executor: E, insert: Insert<T>) -> StorageResult<T>
where
    E: sqlx::Executor<'e, Database = Postgres>,
    T: Storable,
{
    let columns: Vec<&str> = insert.values.iter().map(|(c, _)| c.as_str()).collect();
    let sql = build_insert_sql(&insert.table, &columns);

    let mut args = PgArguments::default();
    for (column, value) in &insert.values {
        bind_value(&mut args, value, T::column_type(column))?;
    }

    let row = sqlx::query_with(&sql, args)
        .fetch_one(executor)
        .await
        .map_err(unavailable)?;

    deserialize_row::<T>(&row)
}

#[async_trait]
impl QueryExecutor for PgPool {
    async fn fetch<T: Storable>(&self, query: Query<T>) -> StorageResult<Vec<T>> {
        let mut sql = format!(
            "SELECT * FROM {}{}{}",
            query.table,
            build_where_clause(&query.filters, 1),
            build_order_clause(&query.order_by)
        );
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut args = PgArguments::default();
        bind_filters::<T>(&mut args, &query.filters)?;

        let rows = sqlx::query_with(&sql, args)
            .fetch_all(&self.0)
            .await
            .map_err(unavailable)?;

        rows.iter().map(deserialize_row::<T>).collect()
    }

    async fn exists<T: Storable>(&self, query: Query<T>) -> StorageResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {}{})",
            query.table,
            build_where_clause(&query.filters, 1)
        );

        let mut args = PgArguments::default();
        bind_filters::<T>(&mut args, &query.filters)?;

        let row = sqlx::query_with(&sql, args)
            .fetch_one(&self.0)
            .await
            .map_err(unavailable)?;

        use sqlx::Row;
        row.try_get::<bool, _>(0).map_err(unavailable)
    }

    async fn insert<T: Storable>(&self, insert: Insert<T>) -> StorageResult<T> {
        insert_with(&self.0, insert).await
    }

    async fn update<T: Storable>(&self, update: Update<T>) -> StorageResult<Vec<T>> {
        let columns: Vec<&str> = update.assignments.iter().map(|(c, _)| c.as_str()).collect();
        let sql = build_update_sql(&update.table, &columns, &update.filters);

        let mut args = PgArguments::default();
        for (column, value) in &update.assignments {
            bind_value(&mut args, value, T::column_type(column))?;
        }
        bind_filters::<T>(&mut args, &update.filters)?;

        let rows = sqlx::query_with(&sql, args)
            .fetch_all(&self.0)
            .await
            .map_err(unavailable)?;
        debug!(table = %update.table, rows = rows.len(), "update applied");

        rows.iter().map(deserialize_row::<T>).collect()
    }

    async fn delete<T: Storable>(&self, delete: Delete<T>) -> StorageResult<u64> {
        let sql = format!(
            "DELETE FROM {}{}",
            delete.table,
            build_where_clause(&delete.filters, 1)
        );

        let mut args = PgArguments::default();
        bind_filters::<T>(&mut args, &delete.filters)?;

        let result = sqlx::query_with(&sql, args)
            .execute(&self.0)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_numbers_filters_after_assignments() {
        let filters = vec![
            Filter::Eq("id".into(), Value::Int(4)),
            Filter::Eq("version".into(), Value::UInt(2)),
        ];
        let sql = build_update_sql("items", &["claimed_by", "version"], &filters);
        assert_eq!(
            sql,
            "UPDATE items SET claimed_by = $1, version = $2 WHERE id = $3 AND version = $4 RETURNING *"
        );
    }

    #[test]
    fn insert_returns_the_stored_row() {
        assert_eq!(
            build_insert_sql("items", &["name", "description"]),
            "INSERT INTO items (name, description) VALUES ($1, $2) RETURNING *"
        );
    }

    #[test]
    fn empty_clauses_render_nothing() {
        assert_eq!(build_where_clause(&[], 1), "");
        assert_eq!(build_order_clause(&[]), "");
        assert_eq!(
            build_order_clause(&[("id".into(), Order::Asc)]),
            " ORDER BY id ASC"
        );
    }
}
