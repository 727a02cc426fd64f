//! Claim Registry - a catalog of unique items that guests can claim.
//!
//! The crate holds the claim/release state machine and everything it needs
//! short of a transport: the item model, the store abstraction it writes
//! through, an in-memory store, and a process-local cache.
//!
//! # Core Concepts
//!
//! - **Item**: a single claimable unit. It is either available or claimed by
//!   exactly one guest.
//! - **Version**: a counter bumped by every mutation. Stores use it as a
//!   compare-and-swap token, which is the only thing keeping two concurrent
//!   claims from both succeeding.
//! - **Cache**: per-item entries with absolute and sliding expiry plus a
//!   catalog entry purged on every write. It never decides an outcome.
//!
//! # Traits
//!
//! - [`ItemStore`]: source of truth for items
//! - [`RepositoryConnection`]: connection and schema setup for database backends
//! - [`QueryExecutor`]: database-agnostic query execution for backends
//! - [`Storable`]: table metadata for row-oriented backends

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod cache;
mod config;
mod error;
mod item;
mod memory;
mod query;
mod seed;
mod service;
mod storable;
mod store;
mod time;

pub use cache::{Generation, ItemCache};
pub use config::{CacheConfig, DEFAULT_ABSOLUTE_EXPIRATION, DEFAULT_SLIDING_EXPIRATION};
pub use error::{RegistryError, StorageResult, StoreError};
pub use item::{
    Claim, ClaimRequest, INITIAL_VERSION, Item, ItemId, ItemPatch, ItemView, MAX_DESCRIPTION_LEN,
    MAX_GUEST_NAME_LEN, MAX_NAME_LEN, NewItem,
};
pub use memory::InMemoryItemStore;
pub use query::{Delete, Filter, Insert, Order, Query, QueryExecutor, Update, Value};
pub use seed::default_catalog;
pub use service::{ClaimService, RegistryResult};
pub use storable::Storable;
pub use store::{ConnectionConfig, ItemStore, RepositoryConnection};
pub use time::Timestamp;

// Re-exported so callers don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
