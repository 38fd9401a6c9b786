//! # Courier
//!
//! HTTP client core for JSON APIs on flaky mobile networks.
//!
//! ## Features
//!
//! - Conditional caching with ETag / `If-None-Match` revalidation
//! - In-flight coalescing of identical concurrent requests
//! - Fallback endpoints tried in order when the primary is unreachable
//! - Per-caller typed decoding with server error messages preserved
//! - Memory, size-bounded and on-disk cache backends

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod inflight;
pub mod outcome;
pub mod proxy;
pub mod transport;

pub use builder::ClientConfigBuilder;
pub use cache::{CacheBackend, CacheConfig, CacheEntry, ConditionalCache, ResourceKey};
pub use config::ClientConfig;
pub use error::{RequestError, TransportError};

// Re-export the request executor
pub use client::{ApiClient, ApiRequest, RequestHook};

// Re-export outcome and response types
pub use inflight::InFlightRegistry;
pub use outcome::{ApiResponse, RawOutcome, RawResponse, ResponseSource};

// Re-export transport utilities
pub use transport::{HttpTransport, OutgoingRequest, Transport, TransportResponse, create_client};

// Re-export proxy utilities
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
