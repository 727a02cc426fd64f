//! PostgreSQL backend for claim-registry.
//!
//! [`PgItemStore`] keeps items in a single `items` table and implements
//! [`ItemStore`](claim_registry::ItemStore) on top of the core crate's query
//! builder. Rows are mapped through serde using the `Storable` metadata on
//! [`Item`](claim_registry::Item), so there is no hand-written row code.
//!
//! # Usage
//!
//! ```text
//! use claim_registry::{ClaimService, RepositoryConnection};
//! use claim_registry_postgres::PgItemStore;
//!
//! let store = PgItemStore::connect("postgres://localhost/registry").await?;
//! store.initialize().await?;
//! let service = ClaimService::new(store);
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod executor;
mod serde_bind;
mod store;

pub use executor::{DEFAULT_MAX_CONNECTIONS, PgPool};
pub use serde_bind::{deserialize_row, row_values};
pub use store::{PgConfig, PgItemStore};
