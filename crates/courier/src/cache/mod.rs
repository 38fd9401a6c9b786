//! # Cache System
//!
//! This module provides the conditional cache: per resource, the last ETag the
//! server issued and the body it identifies, so repeat requests can be
//! revalidated with `If-None-Match` instead of downloaded again.

// Module declarations
mod manager;
pub mod providers;
mod types;
mod utils;

// Re-export primary types from our various modules
pub use manager::ConditionalCache;
pub use types::{CacheBackend, CacheConfig, CacheEntry, CacheResult, ResourceKey};
pub use utils::extract_validator;

pub use providers::{BoundedStore, CacheProvider, FileStore, MemoryStore};
