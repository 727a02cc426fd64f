//! Process-local cache in front of an [`ItemStore`](crate::ItemStore).
//!
//! Two entry families are kept:
//! - the catalog: the full item list, kept until a write purges it
//! - per-item entries with absolute and sliding expiry, checked lazily on lookup
//!
//! Reads that miss go to the store and then *fill* the cache. A fill carries
//! the [`Generation`] observed before the store read and is discarded if any
//! write landed in between, so a slow reader can never put a pre-write value
//! back after the writer refreshed or purged it.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{CacheConfig, Item, ItemId};

/// Write counter snapshot used to reject stale fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug)]
struct CacheEntry {
    item: Item,
    inserted_at: Instant,
    last_access: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    items: HashMap<ItemId, CacheEntry>,
    catalog: Option<Vec<Item>>,
    generation: u64,
}

impl CacheState {
    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Debug)]
pub struct ItemCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl Default for ItemCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ItemCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Snapshot to pass to [`fill_item`](Self::fill_item) or
    /// [`fill_catalog`](Self::fill_catalog) after the store read.
    pub fn generation(&self) -> Generation {
        Generation(self.state.lock().generation)
    }

    /// Cached copy of an item, if present and not expired. A hit counts as
    /// an access for sliding expiry.
    pub fn item(&self, id: ItemId) -> Option<Item> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let entry = state.items.get_mut(&id)?;
        if self.is_expired(entry, now) {
            state.items.remove(&id);
            return None;
        }

        entry.last_access = now;
        Some(entry.item.clone())
    }

    /// Cache an item read from the store. Returns `false` if a write happened
    /// since `seen` and the value was dropped.
    pub fn fill_item(&self, item: Item, seen: Generation) -> bool {
        let mut state = self.state.lock();
        if state.generation != seen.0 {
            return false;
        }
        state.items.insert(item.id, CacheEntry::new(item));
        true
    }

    /// The full item list, if cached.
    pub fn catalog(&self) -> Option<Vec<Item>> {
        self.state.lock().catalog.clone()
    }

    /// Cache the full list read from the store. Returns `false` if a write
    /// happened since `seen` and the list was dropped.
    pub fn fill_catalog(&self, items: Vec<Item>, seen: Generation) -> bool {
        let mut state = self.state.lock();
        if state.generation != seen.0 {
            return false;
        }
        state.catalog = Some(items);
        true
    }

    /// Record a committed write: the item's entry takes the new state and the
    /// catalog is purged.
    pub fn refresh_item(&self, item: Item) {
        let mut state = self.state.lock();
        state.bump();
        state.catalog = None;
        state.items.insert(item.id, CacheEntry::new(item));
    }

    /// Record a committed delete: the item's entry and the catalog are purged.
    pub fn evict_item(&self, id: ItemId) {
        let mut state = self.state.lock();
        state.bump();
        state.catalog = None;
        state.items.remove(&id);
    }

    /// Drop an item's entry without touching the catalog, e.g. after the
    /// store reported the cached copy as stale.
    pub fn forget_item(&self, id: ItemId) {
        let mut state = self.state.lock();
        state.bump();
        state.items.remove(&id);
    }

    /// Number of per-item entries currently held, expired or not.
    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) >= self.config.absolute_expiration
            || now.duration_since(entry.last_access) >= self.config.sliding_expiration
    }
}

impl CacheEntry {
    fn new(item: Item) -> Self {
        let now = Instant::now();
        Self {
            item,
            inserted_at: now,
            last_access: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::INITIAL_VERSION;

    fn item(id: i64, name: &str) -> Item {
        Item {
            id: ItemId(id),
            name: name.to_string(),
            description: None,
            claim: None,
            version: INITIAL_VERSION,
        }
    }

    fn short_lived() -> ItemCache {
        ItemCache::new(
            CacheConfig::default()
                .with_absolute_expiration(Duration::from_secs(30))
                .with_sliding_expiration(Duration::from_secs(10)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn sliding_expiry_drops_idle_entries() {
        let cache = short_lived();
        cache.refresh_item(item(1, "Kettle"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.item(ItemId(1)).is_some());

        // The hit above restarted the idle clock.
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.item(ItemId(1)).is_some());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.item(ItemId(1)).is_none());
        assert_eq!(cache.item_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn absolute_expiry_wins_over_frequent_access() {
        let cache = short_lived();
        cache.refresh_item(item(1, "Kettle"));

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert!(cache.item(ItemId(1)).is_some());
        }

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.item(ItemId(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_never_expires_on_its_own() {
        let cache = short_lived();
        let seen = cache.generation();
        assert!(cache.fill_catalog(vec![item(1, "Kettle")], seen));

        tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(cache.catalog().map(|c| c.len()), Some(1));
    }

    #[test]
    fn writes_purge_the_catalog() {
        let cache = ItemCache::default();
        assert!(cache.fill_catalog(vec![item(1, "Kettle")], cache.generation()));

        cache.refresh_item(item(1, "Blender"));
        assert!(cache.catalog().is_none());
        assert_eq!(cache.item(ItemId(1)).map(|i| i.name), Some("Blender".into()));

        assert!(cache.fill_catalog(vec![item(1, "Blender")], cache.generation()));
        cache.evict_item(ItemId(1));
        assert!(cache.catalog().is_none());
        assert!(cache.item(ItemId(1)).is_none());
    }

    #[test]
    fn fills_started_before_a_write_are_dropped() {
        let cache = ItemCache::default();
        let seen = cache.generation();

        cache.evict_item(ItemId(1));

        assert!(!cache.fill_item(item(1, "Kettle"), seen));
        assert!(!cache.fill_catalog(vec![item(1, "Kettle")], seen));
        assert!(cache.item(ItemId(1)).is_none());
        assert!(cache.catalog().is_none());
    }

    #[test]
    fn forget_keeps_the_catalog() {
        let cache = ItemCache::default();
        assert!(cache.fill_catalog(vec![item(1, "Kettle")], cache.generation()));
        assert!(cache.fill_item(item(1, "Kettle"), cache.generation()));

        cache.forget_item(ItemId(1));
        assert!(cache.item(ItemId(1)).is_none());
        assert!(cache.catalog().is_some());
    }
}
