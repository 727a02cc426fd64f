//! In-memory [`ItemStore`] for tests and single-process deployments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{INITIAL_VERSION, Item, ItemId, ItemStore, NewItem, StorageResult, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    items: BTreeMap<ItemId, Item>,
    // Only ever grows, so deleted ids are never handed out again.
    last_id: i64,
}

/// Items held in a `BTreeMap` behind a single lock.
///
/// The version check and the write happen under the same write guard, which
/// is what makes [`ItemStore::update`] a compare-and-swap here.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    state: RwLock<MemoryState>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }
}

impl MemoryState {
    fn insert(&mut self, item: NewItem) -> Item {
        self.last_id += 1;
        let stored = Item {
            id: ItemId(self.last_id),
            name: item.name,
            description: item.description,
            claim: None,
            version: INITIAL_VERSION,
        };
        self.items.insert(stored.id, stored.clone());
        stored
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn get(&self, id: ItemId) -> StorageResult<Option<Item>> {
        Ok(self.state.read().items.get(&id).cloned())
    }

    async fn list(&self) -> StorageResult<Vec<Item>> {
        Ok(self.state.read().items.values().cloned().collect())
    }

    async fn insert(&self, item: NewItem) -> StorageResult<Item> {
        Ok(self.state.write().insert(item))
    }

    async fn update(&self, item: &Item, expected_version: u64) -> StorageResult<Item> {
        let mut state = self.state.write();
        let current = state
            .items
            .get_mut(&item.id)
            .ok_or(StoreError::NotFound(item.id))?;

        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: item.id,
                expected: expected_version,
                actual: current.version,
            });
        }

        *current = item.clone();
        Ok(item.clone())
    }

    async fn delete(&self, id: ItemId) -> StorageResult<bool> {
        Ok(self.state.write().items.remove(&id).is_some())
    }

    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(InMemoryItemStore::is_empty(self))
    }

    async fn seed(&self, items: Vec<NewItem>) -> StorageResult<Vec<Item>> {
        let mut state = self.state.write();
        if !state.items.is_empty() {
            return Ok(Vec::new());
        }
        Ok(items.into_iter().map(|item| state.insert(item)).collect())
    }
}
