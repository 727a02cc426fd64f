//! PostgreSQL-backed [`ItemStore`].

use std::path::Path;

use async_trait::async_trait;
use claim_registry::{
    ConnectionConfig, Delete, INITIAL_VERSION, Insert, Item, ItemId, ItemStore, NewItem, Order,
    Query, QueryExecutor, RepositoryConnection, Storable, StorageResult, StoreError, Update,
};
use sqlx::migrate::Migrator;
use tracing::{debug, instrument, warn};

use crate::executor::{DEFAULT_MAX_CONNECTIONS, insert_with, unavailable};
use crate::{PgPool, row_values};

/// Connection settings for [`PgItemStore`].
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub connection: ConnectionConfig,
    pub max_connections: u32,
}

impl PgConfig {
    pub fn new(connection: impl Into<ConnectionConfig>) -> Self {
        Self {
            connection: connection.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl From<ConnectionConfig> for PgConfig {
    fn from(connection: ConnectionConfig) -> Self {
        Self::new(connection)
    }
}

/// Items in the `items` table.
///
/// Ids come from an identity column and are never reused. `update` is a
/// single `UPDATE ... WHERE id = $n AND version = $m`, so the database does
/// the compare-and-swap.
#[derive(Clone, Debug)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect_with(config: PgConfig) -> StorageResult<Self> {
        let ConnectionConfig::Url(url) = config.connection;
        let pool = PgPool::connect_with(&url, config.max_connections).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RepositoryConnection for PgItemStore {
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> StorageResult<Self> {
        Self::connect_with(PgConfig::new(config)).await
    }

    async fn initialize(&self) -> StorageResult<()> {
        let migrations_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        Migrator::new(migrations_path)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .run(self.pool.inner())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn get(&self, id: ItemId) -> StorageResult<Option<Item>> {
        self.pool
            .fetch_optional(Query::<Item>::new().eq("id", id))
            .await
    }

    async fn list(&self) -> StorageResult<Vec<Item>> {
        self.pool
            .fetch(Query::<Item>::new().order_by("id", Order::Asc))
            .await
    }

    #[instrument(level = "debug", skip_all, fields(name = %item.name))]
    async fn insert(&self, item: NewItem) -> StorageResult<Item> {
        let stored = self.pool.insert(new_row(item)).await?;
        debug!(item_id = %stored.id, "row inserted");
        Ok(stored)
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(item_id = %item.id, expected_version = expected_version)
    )]
    async fn update(&self, item: &Item, expected_version: u64) -> StorageResult<Item> {
        let update = row_values(item)?
            .into_iter()
            .fold(Update::<Item>::new(), |update, (column, value)| {
                update.set(column, value)
            })
            .eq("id", item.id)
            .eq("version", expected_version);

        if let Some(stored) = self.pool.update(update).await?.into_iter().next() {
            return Ok(stored);
        }

        // Nothing matched: either the row is gone or its version moved on.
        match self.get(item.id).await? {
            None => Err(StoreError::NotFound(item.id)),
            Some(current) => {
                warn!(actual = current.version, "version check failed");
                Err(StoreError::VersionConflict {
                    id: item.id,
                    expected: expected_version,
                    actual: current.version,
                })
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, id: ItemId) -> StorageResult<bool> {
        let affected = self.pool.delete(Delete::<Item>::new().eq("id", id)).await?;
        Ok(affected > 0)
    }

    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(!self.pool.exists(Query::<Item>::new()).await?)
    }

    /// One transaction holding a table lock that concurrent seeds conflict
    /// on, so the emptiness check and every insert land together or not at all.
    #[instrument(level = "debug", skip_all, fields(entries = items.len()))]
    async fn seed(&self, items: Vec<NewItem>) -> StorageResult<Vec<Item>> {
        let table = Item::table_name();
        let mut tx = self.pool.inner().begin().await.map_err(unavailable)?;

        sqlx::query(&format!("LOCK TABLE {} IN SHARE ROW EXCLUSIVE MODE", table))
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        let populated: bool =
            sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {})", table))
                .fetch_one(&mut *tx)
                .await
                .map_err(unavailable)?;
        if populated {
            tx.rollback().await.map_err(unavailable)?;
            return Ok(Vec::new());
        }

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(insert_with(&mut *tx, new_row(item)).await?);
        }

        tx.commit().await.map_err(unavailable)?;
        debug!(inserted = stored.len(), "batch committed");
        Ok(stored)
    }
}

fn new_row(item: NewItem) -> Insert<Item> {
    Insert::<Item>::new()
        .value("name", item.name)
        .value("description", item.description)
        .value("version", INITIAL_VERSION)
}
