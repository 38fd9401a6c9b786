//! # Cache Types
//!
//! This module defines common types used across the caching system.

use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Identifies both a cache entry and an in-flight bucket.
///
/// Derived from the method, the resolved URL and a digest of the body, so two
/// logically identical requests always map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Create a key for a request
    pub fn new(method: &Method, url: &Url, body: Option<&[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_str());
        hasher.update(b"\n");
        hasher.update(url.as_str());
        hasher.update(b"\n");
        match body {
            // A missing body and an empty body are different requests
            None => hasher.update([0u8]),
            Some(body) => {
                hasher.update([1u8]);
                hasher.update(Sha256::digest(body));
            }
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest backing this key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        format!("{}.entry", self.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first 16 hex chars are plenty to tell keys apart in logs
        f.write_str(&self.0[..16.min(self.0.len())])
    }
}

/// Validator and body stored for one resource.
///
/// Always written and read as a whole; nothing ever updates one half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// ETag issued by the server for `body`
    pub validator: String,
    /// Response body the validator identifies
    pub body: Bytes,
    /// When the entry was stored (seconds since the unix epoch)
    pub stored_at: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(body: Bytes, validator: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            body,
            stored_at: unix_now(),
        }
    }

    /// Whether the entry has been held longer than `max_age`
    pub fn is_older_than(&self, max_age: Duration) -> bool {
        unix_now().saturating_sub(self.stored_at) > max_age.as_secs()
    }

    pub(crate) fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            validator: self.validator.clone(),
            stored_at: self.stored_at,
            size: self.body.len() as u64,
        }
    }
}

/// On-disk header describing a persisted entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryMetadata {
    pub validator: String,
    pub stored_at: u64,
    pub size: u64,
}

/// Where cache entries live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Unbounded in-process map
    Memory,
    /// In-process cache evicting by total body size
    Bounded { max_bytes: u64 },
    /// Persistent cache directory
    Disk { path: PathBuf },
}

/// Configuration for the conditional cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether conditional caching is enabled at all
    pub enabled: bool,
    /// Storage backend for entries
    pub backend: CacheBackend,
    /// Entries older than this are ignored and dropped on lookup
    pub max_entry_age: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            max_entry_age: None,
        }
    }
}

impl CacheConfig {
    /// A configuration that never stores or serves anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, std::io::Error>;

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
