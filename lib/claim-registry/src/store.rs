//! Store traits for claimable items.
//!
//! - `ItemStore`: the source of truth for items, with version-checked writes
//! - `RepositoryConnection`: database connection and initialization

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Item, ItemId, NewItem, StorageResult};

/// Connection configuration for database backends.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Connect using a database URL string.
    Url(String),
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_string())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.clone())
    }
}

/// Trait for database connection and initialization.
///
/// Each backend implements its own connection and migration logic.
#[async_trait]
pub trait RepositoryConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> StorageResult<Self>;

    /// Initialize the database schema (run migrations).
    async fn initialize(&self) -> StorageResult<()>;
}

/// Persistent collection of items keyed by [`ItemId`].
///
/// `update` is the only write path for existing items and must be an atomic
/// compare-and-swap on the version: of two writers holding the same
/// `expected_version`, exactly one succeeds and the other receives
/// [`StoreError::VersionConflict`](crate::StoreError::VersionConflict).
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Get an item by id. Returns `None` if no such item exists.
    async fn get(&self, id: ItemId) -> StorageResult<Option<Item>>;

    /// All items, ordered by id.
    async fn list(&self) -> StorageResult<Vec<Item>>;

    /// Insert a new unclaimed item at [`INITIAL_VERSION`](crate::INITIAL_VERSION)
    /// and return it with its assigned id.
    async fn insert(&self, item: NewItem) -> StorageResult<Item>;

    /// Replace the stored item with `item` if the stored version still equals
    /// `expected_version`.
    ///
    /// Fails with `NotFound` if the item is gone and `VersionConflict` if the
    /// stored version moved on.
    async fn update(&self, item: &Item, expected_version: u64) -> StorageResult<Item>;

    /// Delete an item. Returns `true` if it existed.
    async fn delete(&self, id: ItemId) -> StorageResult<bool>;

    /// Whether the store holds no items at all.
    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.list().await?.is_empty())
    }

    /// Insert every entry of `items` if the store is empty, otherwise none.
    /// Returns the stored items, or an empty list when the store was
    /// already populated.
    ///
    /// The default checks and inserts one item at a time. Backends override
    /// it to make the check and the whole batch a single atomic write.
    async fn seed(&self, items: Vec<NewItem>) -> StorageResult<Vec<Item>> {
        if !self.is_empty().await? {
            return Ok(Vec::new());
        }

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(self.insert(item).await?);
        }
        Ok(stored)
    }
}

#[async_trait]
impl<S: ItemStore + ?Sized> ItemStore for Arc<S> {
    async fn get(&self, id: ItemId) -> StorageResult<Option<Item>> {
        (**self).get(id).await
    }

    async fn list(&self) -> StorageResult<Vec<Item>> {
        (**self).list().await
    }

    async fn insert(&self, item: NewItem) -> StorageResult<Item> {
        (**self).insert(item).await
    }

    async fn update(&self, item: &Item, expected_version: u64) -> StorageResult<Item> {
        (**self).update(item, expected_version).await
    }

    async fn delete(&self, id: ItemId) -> StorageResult<bool> {
        (**self).delete(id).await
    }

    async fn is_empty(&self) -> StorageResult<bool> {
        (**self).is_empty().await
    }

    async fn seed(&self, items: Vec<NewItem>) -> StorageResult<Vec<Item>> {
        (**self).seed(items).await
    }
}
