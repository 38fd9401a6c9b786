//! # Cache Providers
//!
//! This module contains different cache provider implementations.

// Re-export providers for easier access
pub use self::bounded::BoundedStore;
pub use self::file::FileStore;
pub use self::memory::MemoryStore;
pub use self::provider::CacheProvider;

// Provider interface
pub mod provider;

// Individual provider implementations
pub mod bounded;
pub mod file;
pub mod memory;
