use thiserror::Error;

use crate::ItemId;

pub type StorageResult<T> = Result<T, StoreError>;

/// Errors raised by an [`ItemStore`](crate::ItemStore) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: item {0}")]
    NotFound(ItemId),

    /// The persisted version no longer matched `expected` at write time.
    #[error("Version conflict on item {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: ItemId,
        expected: u64,
        actual: u64,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be mapped back to an item.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Outcome of a failed registry operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Item {0} not found")]
    NotFound(ItemId),

    #[error("Item {id} is already claimed by {claimed_by}")]
    AlreadyClaimed { id: ItemId, claimed_by: String },

    #[error("Item {0} is not currently claimed")]
    NotClaimed(ItemId),

    /// The caller should re-read the item and retry the whole operation.
    #[error("Item {id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict {
        id: ItemId,
        expected: u64,
        actual: u64,
    },

    /// The item's version counter cannot be advanced any further.
    #[error("Item {0} has no versions left")]
    VersionExhausted(ItemId),

    #[error(transparent)]
    StoreUnavailable(StoreError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RegistryError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        RegistryError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Conventional HTTP status for this error, for boundary layers that map
    /// domain errors onto a transport.
    pub fn status_hint(&self) -> u16 {
        match self {
            RegistryError::Validation { .. } | RegistryError::NotClaimed(_) => 400,
            RegistryError::NotFound(_) => 404,
            RegistryError::AlreadyClaimed { .. }
            | RegistryError::VersionConflict { .. }
            | RegistryError::VersionExhausted(_) => 409,
            RegistryError::Cancelled => 499,
            RegistryError::StoreUnavailable(_) => 503,
        }
    }

    /// Whether re-reading and retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::VersionConflict { .. })
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => RegistryError::NotFound(id),
            StoreError::VersionConflict {
                id,
                expected,
                actual,
            } => RegistryError::VersionConflict {
                id,
                expected,
                actual,
            },
            other => RegistryError::StoreUnavailable(other),
        }
    }
}
