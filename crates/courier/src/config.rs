use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::{CacheConfig, proxy::ProxyConfig};

const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Configurable options for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Primary endpoint every path is resolved against
    pub base_url: String,

    /// Endpoints tried in order when the primary cannot be reached
    pub fallback_urls: Vec<String>,

    /// Headers sent with every request (JSON Accept/Content-Type by default)
    pub headers: HeaderMap,

    /// Path prefixes that opt out of ETag revalidation
    pub uncached_paths: Vec<String>,

    /// Conditional cache configuration
    pub cache_config: CacheConfig,

    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            fallback_urls: Vec::new(),
            headers: ClientConfig::get_default_headers(),
            uncached_paths: Vec::new(),
            cache_config: CacheConfig::default(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy: None,
            use_system_proxy: true, // Enable system proxy by default
        }
    }
}

impl ClientConfig {
    pub fn builder() -> crate::builder::ClientConfigBuilder {
        crate::builder::ClientConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        default_headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        default_headers
    }

    /// Whether ETag revalidation applies to `path`
    pub fn is_conditional(&self, path: &str) -> bool {
        if !self.cache_config.enabled {
            return false;
        }

        let path = path.trim_start_matches('/');
        !self
            .uncached_paths
            .iter()
            .map(|prefix| prefix.trim_start_matches('/'))
            .any(|prefix| path.starts_with(prefix))
    }
}
