//! Cache configuration.

use std::time::Duration;

/// Configuration for a [`CachedCollection`](crate::cached::CachedCollection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entity stays fresh after it is loaded into the cache.
    pub expire_after: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expire_after: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    pub fn new(expire_after: Duration) -> Self {
        Self { expire_after }
    }

    /// Set the freshness window for cached entities.
    #[must_use]
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.expire_after = duration;
        self
    }

    /// Config for lookup tables that change rarely.
    pub fn reference_data() -> Self {
        Self {
            expire_after: Duration::from_secs(24 * 3600), // 1 day
        }
    }
}
