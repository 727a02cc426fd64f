//! The claim/release state machine.
//!
//! [`ClaimService`] sits between a transport layer and an [`ItemStore`]. Every
//! write re-reads the item from the store, checks its preconditions against
//! that fresh copy and commits through the store's version-checked
//! [`update`](ItemStore::update); the cache is refreshed only after the store
//! accepted the write.
//!
//! Each operation takes a [`CancellationToken`]. Store reads race the token.
//! Commits never do: the token is checked right before a commit starts and a
//! started commit runs to completion, so a cancelled call either changed
//! nothing or changed the store and the cache together.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::item::validate_guest_name;
use crate::{
    CacheConfig, ClaimRequest, Item, ItemCache, ItemId, ItemPatch, ItemStore, ItemView, NewItem,
    RegistryError, StorageResult, Timestamp,
};

pub type RegistryResult<T> = Result<T, RegistryError>;

pub struct ClaimService<S> {
    store: S,
    cache: ItemCache,
}

impl<S: ItemStore> ClaimService<S> {
    /// Service over `store` with the default cache policy.
    pub fn new(store: S) -> Self {
        Self::with_cache_config(store, CacheConfig::default())
    }

    pub fn with_cache_config(store: S, config: CacheConfig) -> Self {
        Self {
            store,
            cache: ItemCache::new(config),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    /// All items, served from the catalog cache when it is populated.
    #[instrument(level = "debug", skip_all)]
    pub async fn list(&self, cancel: &CancellationToken) -> RegistryResult<Vec<ItemView>> {
        ensure_live(cancel)?;

        if let Some(items) = self.cache.catalog() {
            debug!(count = items.len(), "catalog served from cache");
            return Ok(items.iter().map(ItemView::from).collect());
        }

        let seen = self.cache.generation();
        let items = guarded(cancel, self.store.list()).await?;
        let views = items.iter().map(ItemView::from).collect();
        if !self.cache.fill_catalog(items, seen) {
            debug!("catalog changed during load, not cached");
        }
        Ok(views)
    }

    /// A single item, served from the per-item cache when fresh.
    #[instrument(level = "debug", skip_all, fields(item_id = %id))]
    pub async fn find(
        &self,
        id: ItemId,
        cancel: &CancellationToken,
    ) -> RegistryResult<Option<ItemView>> {
        ensure_live(cancel)?;

        if let Some(item) = self.cache.item(id) {
            debug!(version = item.version, "item served from cache");
            return Ok(Some(item.view()));
        }

        let seen = self.cache.generation();
        let item = guarded(cancel, self.store.get(id)).await?;
        if let Some(item) = &item {
            self.cache.fill_item(item.clone(), seen);
        }
        Ok(item.map(ItemView::from))
    }

    #[instrument(level = "debug", skip_all, fields(name = %item.name))]
    pub async fn create(
        &self,
        item: NewItem,
        cancel: &CancellationToken,
    ) -> RegistryResult<ItemView> {
        let item = item.validated()?;
        ensure_live(cancel)?;

        let stored = self.store.insert(item).await?;
        self.cache.refresh_item(stored.clone());

        info!(item_id = %stored.id, version = stored.version, "item created");
        Ok(stored.view())
    }

    /// Claim an available item for a guest.
    ///
    /// An item that is already claimed yields `AlreadyClaimed` naming the
    /// current claimant, even when `expected_version` is also stale.
    #[instrument(level = "debug", skip_all, fields(item_id = %id))]
    pub async fn claim(
        &self,
        id: ItemId,
        request: ClaimRequest,
        cancel: &CancellationToken,
    ) -> RegistryResult<ItemView> {
        let guest_name = validate_guest_name(&request.guest_name)?;
        ensure_live(cancel)?;

        let cached_claim = self.cache.item(id).and_then(|item| item.claim);
        if let Some(claimed_by) = cached_claim.map(|c| c.guest_name) {
            debug!(%claimed_by, "claim rejected from cache");
            return Err(RegistryError::AlreadyClaimed { id, claimed_by });
        }

        let current = self.fetch(id, cancel).await?;
        if let Some(claimed_by) = current.claimed_by() {
            return Err(RegistryError::AlreadyClaimed {
                id,
                claimed_by: claimed_by.to_string(),
            });
        }

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                warn!(expected, actual = current.version, "claim with stale version");
                return Err(RegistryError::VersionConflict {
                    id,
                    expected,
                    actual: current.version,
                });
            }
        }

        let next = current.claimed(guest_name, Timestamp::now())?;
        let stored = match self.commit(&next, current.version, cancel).await {
            Err(conflict @ RegistryError::VersionConflict { .. }) => {
                let winner = self.reread_after_conflict(id, conflict.clone(), cancel).await?;
                return Err(match winner.claim {
                    Some(claim) => RegistryError::AlreadyClaimed {
                        id,
                        claimed_by: claim.guest_name,
                    },
                    None => conflict,
                });
            }
            other => other?,
        };

        info!(
            guest = stored.claimed_by().unwrap_or_default(),
            version = stored.version,
            "item claimed"
        );
        Ok(stored.view())
    }

    /// Release a claimed item back to `Available`.
    #[instrument(level = "debug", skip_all, fields(item_id = %id))]
    pub async fn release(
        &self,
        id: ItemId,
        cancel: &CancellationToken,
    ) -> RegistryResult<ItemView> {
        ensure_live(cancel)?;

        let current = self.fetch(id, cancel).await?;
        if !current.is_claimed() {
            return Err(RegistryError::NotClaimed(id));
        }

        let next = current.released()?;
        let stored = match self.commit(&next, current.version, cancel).await {
            Err(conflict @ RegistryError::VersionConflict { .. }) => {
                let winner = self.reread_after_conflict(id, conflict.clone(), cancel).await?;
                return Err(if winner.is_claimed() {
                    conflict
                } else {
                    RegistryError::NotClaimed(id)
                });
            }
            other => other?,
        };

        info!(version = stored.version, "item released");
        Ok(stored.view())
    }

    /// Change an item's name and/or description. Claim state is untouched.
    /// A patch that changes nothing returns the item without a new version.
    #[instrument(level = "debug", skip_all, fields(item_id = %id))]
    pub async fn update(
        &self,
        id: ItemId,
        patch: ItemPatch,
        cancel: &CancellationToken,
    ) -> RegistryResult<ItemView> {
        let patch = patch.validated()?;
        ensure_live(cancel)?;

        let current = self.fetch(id, cancel).await?;
        let Some(next) = current.patched(&patch)? else {
            debug!(version = current.version, "update is a no-op");
            return Ok(current.view());
        };

        let stored = self.commit(&next, current.version, cancel).await?;
        info!(version = stored.version, "item updated");
        Ok(stored.view())
    }

    /// Remove an item permanently. Returns `false` if it did not exist.
    #[instrument(level = "debug", skip_all, fields(item_id = %id))]
    pub async fn delete(&self, id: ItemId, cancel: &CancellationToken) -> RegistryResult<bool> {
        ensure_live(cancel)?;

        let existed = self.store.delete(id).await?;
        if existed {
            self.cache.evict_item(id);
            info!("item deleted");
        } else {
            self.cache.forget_item(id);
            debug!("delete of missing item");
        }
        Ok(existed)
    }

    /// Load `catalog` into the store if, and only if, the store is empty.
    /// Returns the number of items inserted.
    ///
    /// The whole catalog is one commit: the token is checked once before it
    /// starts, and a started seed always loads every entry.
    #[instrument(level = "debug", skip_all, fields(entries = catalog.len()))]
    pub async fn seed(
        &self,
        catalog: Vec<NewItem>,
        cancel: &CancellationToken,
    ) -> RegistryResult<usize> {
        let catalog = catalog
            .into_iter()
            .map(NewItem::validated)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_live(cancel)?;

        let stored = self.store.seed(catalog).await?;
        if stored.is_empty() {
            debug!("store already populated, seed skipped");
            return Ok(0);
        }

        let inserted = stored.len();
        for item in stored {
            self.cache.refresh_item(item);
        }

        info!(inserted, "catalog seeded");
        Ok(inserted)
    }

    /// Authoritative read ahead of a write. Never served from the cache.
    async fn fetch(&self, id: ItemId, cancel: &CancellationToken) -> RegistryResult<Item> {
        match guarded(cancel, self.store.get(id)).await? {
            Some(item) => Ok(item),
            None => {
                self.cache.forget_item(id);
                Err(RegistryError::NotFound(id))
            }
        }
    }

    /// Version-checked write, followed by the cache refresh.
    async fn commit(
        &self,
        next: &Item,
        expected_version: u64,
        cancel: &CancellationToken,
    ) -> RegistryResult<Item> {
        ensure_live(cancel)?;

        match self.store.update(next, expected_version).await {
            Ok(stored) => {
                self.cache.refresh_item(stored.clone());
                Ok(stored)
            }
            Err(e) => {
                self.cache.forget_item(next.id);
                Err(e.into())
            }
        }
    }

    /// Re-read an item after losing a compare-and-swap, so the caller can
    /// report what the winning write did. Falls back to `conflict` when the
    /// re-read itself fails.
    async fn reread_after_conflict(
        &self,
        id: ItemId,
        conflict: RegistryError,
        cancel: &CancellationToken,
    ) -> RegistryResult<Item> {
        warn!(%conflict, "lost concurrent write");

        match guarded(cancel, self.store.get(id)).await {
            Ok(Some(item)) => Ok(item),
            Ok(None) => Err(RegistryError::NotFound(id)),
            Err(_) => Err(conflict),
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> RegistryResult<()> {
    if cancel.is_cancelled() {
        return Err(RegistryError::Cancelled);
    }
    Ok(())
}

/// Await a store read unless the caller cancels first.
async fn guarded<T>(
    cancel: &CancellationToken,
    read: impl Future<Output = StorageResult<T>>,
) -> RegistryResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RegistryError::Cancelled),
        result = read => result.map_err(RegistryError::from),
    }
}
