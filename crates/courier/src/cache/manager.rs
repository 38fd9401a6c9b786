//! # Conditional Cache
//!
//! Front door to the configured provider. Answers "which validator goes with
//! the next request" and "what body do we serve on a 304", and swallows
//! provider I/O failures so they never surface as request errors.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::providers::{BoundedStore, CacheProvider, FileStore, MemoryStore};
use crate::cache::types::{CacheBackend, CacheConfig, CacheEntry, ResourceKey};

/// Conditional cache store shared by every request of a client
#[derive(Clone)]
pub struct ConditionalCache {
    provider: Arc<dyn CacheProvider>,
    config: Arc<CacheConfig>,
}

impl ConditionalCache {
    /// Create a cache with the provider selected by `config.backend`
    pub fn new(config: CacheConfig) -> Self {
        let provider: Arc<dyn CacheProvider> = match &config.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::Bounded { max_bytes } => Arc::new(BoundedStore::new(*max_bytes)),
            CacheBackend::Disk { path } => Arc::new(FileStore::new(path.clone())),
        };
        Self::with_provider(config, provider)
    }

    /// Create a cache around a custom provider
    pub fn with_provider(config: CacheConfig, provider: Arc<dyn CacheProvider>) -> Self {
        debug!(
            enabled = config.enabled,
            backend = ?config.backend,
            max_entry_age = ?config.max_entry_age,
            "Conditional cache created"
        );
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    /// Get configuration reference
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read validator and body together
    pub async fn lookup(&self, key: &ResourceKey) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }

        let entry = match self.provider.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        if let Some(max_age) = self.config.max_entry_age {
            if entry.is_older_than(max_age) {
                debug!(key = %key, stored_at = entry.stored_at, "Dropping aged cache entry");
                self.remove(key).await;
                return None;
            }
        }

        Some(entry)
    }

    /// Validator to send with the next request for `key`
    pub async fn validator_for(&self, key: &ResourceKey) -> Option<String> {
        self.lookup(key).await.map(|entry| entry.validator)
    }

    /// Body to serve when the server answers 304 for `key`
    pub async fn cached_body_for(&self, key: &ResourceKey) -> Option<Bytes> {
        self.lookup(key).await.map(|entry| entry.body)
    }

    /// Store `body` under `validator`, replacing any previous entry as a whole
    pub async fn store(&self, key: ResourceKey, body: Bytes, validator: impl Into<String>) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(body, validator);
        debug!(key = %key, validator = %entry.validator, size = entry.body.len(), "Storing cache entry");

        if let Err(e) = self.provider.put(key.clone(), entry).await {
            warn!(key = %key, error = %e, "Failed to store cache entry");
        }
    }

    /// Remove the entry for `key`
    pub async fn remove(&self, key: &ResourceKey) {
        if let Err(e) = self.provider.remove(key).await {
            warn!(key = %key, error = %e, "Failed to remove cache entry");
        }
    }

    /// Drop every entry, e.g. on logout
    pub async fn clear(&self) {
        match self.provider.clear().await {
            Ok(()) => debug!("Conditional cache cleared"),
            Err(e) => warn!(error = %e, "Failed to clear conditional cache"),
        }
    }

    /// Number of stored entries; provider errors count as empty
    pub async fn len(&self) -> usize {
        self.provider.len().await.unwrap_or_default()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for ConditionalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
