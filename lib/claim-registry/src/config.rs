use std::time::Duration;

/// Default absolute lifetime of a per-item cache entry.
pub const DEFAULT_ABSOLUTE_EXPIRATION: Duration = Duration::from_secs(30 * 60);

/// Default inactivity lifetime of a per-item cache entry.
pub const DEFAULT_SLIDING_EXPIRATION: Duration = Duration::from_secs(10 * 60);

/// Expiry policy for per-item cache entries. An entry is dropped once it is
/// older than `absolute_expiration` or has gone unread for
/// `sliding_expiration`, whichever comes first. The catalog entry has no
/// expiry and only goes away when a write purges it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub absolute_expiration: Duration,
    pub sliding_expiration: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            absolute_expiration: DEFAULT_ABSOLUTE_EXPIRATION,
            sliding_expiration: DEFAULT_SLIDING_EXPIRATION,
        }
    }
}

impl CacheConfig {
    pub fn with_absolute_expiration(mut self, ttl: Duration) -> Self {
        self.absolute_expiration = ttl;
        self
    }

    pub fn with_sliding_expiration(mut self, ttl: Duration) -> Self {
        self.sliding_expiration = ttl;
        self
    }
}
