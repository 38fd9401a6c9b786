//! # Bounded Store
//!
//! In-memory provider backed by Moka, evicting entries once the combined size
//! of stored bodies exceeds a byte budget.

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::cache::providers::CacheProvider;
use crate::cache::types::{CacheEntry, CacheResult, ResourceKey};

/// Moka stores the entry behind one handle, so validator and body are swapped together.
#[derive(Clone)]
pub struct BoundedStore {
    cache: MokaCache<ResourceKey, CacheEntry>,
    /// Maximum size for this cache in bytes
    max_size: u64,
}

impl BoundedStore {
    /// Create a new bounded store with the specified size limit
    pub fn new(max_size_bytes: u64) -> Self {
        if max_size_bytes == 0 {
            panic!("Bounded store size must be greater than zero");
        }

        let cache = MokaCache::builder()
            .weigher(|_k, v: &CacheEntry| entry_weight(&v.body, &v.validator))
            .max_capacity(max_size_bytes)
            .build();

        debug!(max_size = max_size_bytes, "Bounded store created");

        Self {
            cache,
            max_size: max_size_bytes,
        }
    }
}

fn entry_weight(body: &Bytes, validator: &str) -> u32 {
    (body.len() + validator.len())
        .try_into()
        .unwrap_or(u32::MAX)
}

#[async_trait::async_trait]
impl CacheProvider for BoundedStore {
    async fn get(&self, key: &ResourceKey) -> CacheResult<Option<CacheEntry>> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: ResourceKey, entry: CacheEntry) -> CacheResult<()> {
        let size = u64::from(entry_weight(&entry.body, &entry.validator));

        // A single entry shouldn't be larger than the total cache size
        if size > self.max_size {
            warn!(
                key = %key,
                size,
                max_size = self.max_size,
                "Entry too large for bounded store, skipping"
            );
            // Drop the previous version so a 304 can't pair the new validator with stale bytes
            self.cache.invalidate(&key).await;
            return Ok(());
        }

        self.cache.insert(key, entry).await;
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;

        debug!("Bounded store cleared");
        Ok(())
    }

    async fn len(&self) -> CacheResult<usize> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }
}
