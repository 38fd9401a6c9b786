//! # Transport
//!
//! The one place bytes cross the network. `ApiClient` only talks to the
//! [`Transport`] trait, so the HTTP stack can be swapped (or scripted in tests)
//! without touching caching or coalescing.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use rustls::crypto::aws_lc_rs;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info, instrument};
use url::Url;

use crate::ClientConfig;
use crate::error::{RequestError, TransportError};
use crate::proxy::build_proxy_from_config;

/// Fully built request, ready to send
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Whatever the server answered, before classification
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and read its whole body.
    ///
    /// `Err` means no response was obtained; any HTTP status is `Ok`.
    async fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError>;
}

/// `Transport` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, RequestError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url), level = "debug")]
    async fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        // A body cut off mid-stream is a transport failure, not a short success
        let body = response.bytes().await?;

        debug!(status = %status, size = body.len(), "Received response");
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &ClientConfig) -> Result<Client, RequestError> {
    // Create the crypto provider
    let provider = Arc::new(aws_lc_rs::default_provider());

    // Build platform default TLS configuration
    let tls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| RequestError::Config(format!("Failed to configure TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| RequestError::Config(format!("Failed to load platform verifier: {e}")))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        // Explicit proxy configuration takes precedence
        let proxy = build_proxy_from_config(proxy_config)?;
        client_builder = client_builder.proxy(proxy);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder
        .build()
        .map_err(|e| RequestError::Config(format!("Failed to build HTTP client: {e}")))
}
