//! # Cache Provider
//!
//! This module defines the cache provider trait that all cache implementations must follow.

use async_trait::async_trait;

use crate::cache::types::{CacheEntry, CacheResult, ResourceKey};

/// A trait for cache providers that can store and retrieve conditional entries.
///
/// `put` replaces an entry as a whole: a concurrent `get` observes either the
/// previous entry or the new one, never a validator paired with another body.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Get an entry from the cache
    async fn get(&self, key: &ResourceKey) -> CacheResult<Option<CacheEntry>>;

    /// Put an entry into the cache, replacing any previous one
    async fn put(&self, key: ResourceKey, entry: CacheEntry) -> CacheResult<()>;

    /// Remove an entry from the cache
    async fn remove(&self, key: &ResourceKey) -> CacheResult<()>;

    /// Clear all entries from the cache
    async fn clear(&self) -> CacheResult<()>;

    /// Number of entries currently held
    async fn len(&self) -> CacheResult<usize>;
}
