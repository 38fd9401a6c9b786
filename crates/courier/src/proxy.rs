use std::str::FromStr;

use reqwest::Proxy;

use crate::error::RequestError;

/// Proxy configuration types
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy
    Socks5,
    /// All protocols proxy (use this for general-purpose proxies)
    All,
}

impl FromStr for ProxyType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks5" => Ok(ProxyType::Socks5),
            "all" => Ok(ProxyType::All),
            other => Err(RequestError::Proxy(format!("Unknown proxy type: '{other}'"))),
        }
    }
}

/// Proxy authentication type
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    /// Username for proxy authentication
    pub username: String,
    /// Password for proxy authentication
    pub password: String,
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    /// Type of proxy (HTTP, HTTPS, SOCKS5)
    pub proxy_type: ProxyType,
    /// Authentication for the proxy (optional)
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Proxy for all protocols without authentication
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            proxy_type: ProxyType::All,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, RequestError> {
    let proxy_url = &config.url;
    let invalid = |kind: &str, e: reqwest::Error| {
        RequestError::Proxy(format!("Invalid {kind} proxy URL '{proxy_url}': {e}"))
    };

    let mut proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(proxy_url).map_err(|e| invalid("HTTP", e))?,
        ProxyType::Https => Proxy::https(proxy_url).map_err(|e| invalid("HTTPS", e))?,
        ProxyType::Socks5 => {
            // Make sure URL starts with socks5://
            let url = if proxy_url.starts_with("socks5://") {
                proxy_url.to_string()
            } else {
                format!("socks5://{proxy_url}")
            };

            Proxy::all(&url).map_err(|e| invalid("SOCKS5", e))?
        }
        ProxyType::All => Proxy::all(proxy_url).map_err(|e| invalid("general", e))?,
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
