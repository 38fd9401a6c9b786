//! # Memory Store
//!
//! Unbounded in-process provider. One mutex guards the whole map: entries are
//! small and lookups are short, so a single critical section keeps every read
//! and write of a validator/body pair atomic.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::providers::CacheProvider;
use crate::cache::types::{CacheEntry, CacheResult, ResourceKey};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<ResourceKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheProvider for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: ResourceKey, entry: CacheEntry) -> CacheResult<()> {
        self.entries.lock().insert(key, entry);
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> CacheResult<()> {
        if self.entries.lock().remove(key).is_some() {
            debug!(key = %key, "Removed entry from memory store");
        }
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        drop(entries);

        debug!(count, "Memory store cleared");
        Ok(())
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.lock().len())
    }
}
