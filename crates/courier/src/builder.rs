//! # Builder for ClientConfig
//!
//! Fluent construction of [`ClientConfig`](crate::ClientConfig). Every setter
//! starts from the defaults, so only the options that differ need to be named.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use courier_engine::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .with_base_url("https://api.example.com/v1/")
//!     .with_fallback_url("https://backup.example.com/v1/")
//!     .with_timeout(Duration::from_secs(20))
//!     .with_header("X-App-Version", "2.4.0")
//!     .with_uncached_path("auth/")
//!     .build();
//!
//! assert_eq!(config.fallback_urls.len(), 1);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::{CacheBackend, CacheConfig, ClientConfig, proxy::ProxyConfig};

/// Builder for creating ClientConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Start from `ClientConfig::default()`
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the primary endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Append a fallback endpoint, tried after the primary and earlier fallbacks
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.config.fallback_urls.push(url.into());
        self
    }

    /// Replace the fallback endpoints
    pub fn with_fallback_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.fallback_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Opt a path prefix out of ETag revalidation
    pub fn with_uncached_path(mut self, prefix: impl Into<String>) -> Self {
        self.config.uncached_paths.push(prefix.into());
        self
    }

    /// Replace the whole cache configuration
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.config.cache_config = cache_config;
        self
    }

    /// Enable or disable conditional caching
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_config.enabled = enabled;
        self
    }

    /// Persist cache entries under `path`
    pub fn with_disk_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_config.backend = CacheBackend::Disk { path: path.into() };
        self
    }

    /// Ignore cache entries older than `max_age`
    pub fn with_max_entry_age(mut self, max_age: Duration) -> Self {
        self.config.cache_config.max_entry_age = Some(max_age);
        self
    }

    /// Deadline for one attempt, response body included; zero disables it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Deadline for establishing a connection; zero disables it
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Follow up to 10 redirects, or hand 3xx responses back unchanged
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request; invalid names or values are ignored
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Merge headers over the current ones; JSON defaults stay unless overridden
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Route requests through an explicit proxy
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false;
        self
    }

    /// Honor system proxy settings; ignored once an explicit proxy is set
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    /// Build the ClientConfig instance
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
