//! # API Client
//!
//! `ApiClient` ties the pieces together for every request:
//!
//! 1. Resolve the path against the primary endpoint and derive a `ResourceKey`.
//! 2. Join the in-flight registry. Followers just await the shared outcome.
//! 3. The leader attaches `If-None-Match` from the conditional cache, sends to
//!    the primary endpoint and, on transport failure only, to each fallback.
//! 4. The response is classified, the cache updated, and the outcome fanned
//!    out to every waiter. Each caller decodes into its own type.
//!
//! The leader's work runs on its own task, so a caller that stops waiting does
//! not cancel the request for the others.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, IF_NONE_MATCH};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::ClientConfig;
use crate::cache::{CacheBackend, CacheEntry, ConditionalCache, ResourceKey, extract_validator};
use crate::error::{RequestError, TransportError};
use crate::inflight::{InFlightRegistry, LeaderGuard, Role};
use crate::outcome::{ApiResponse, RawOutcome, RawResponse};
use crate::transport::{HttpTransport, OutgoingRequest, Transport, TransportResponse};

/// Last-moment adjustment of an outgoing request (auth headers, signing).
///
/// Runs once per attempt, after the client's own headers are in place, so it
/// sees the final URL of the endpoint being tried.
pub trait RequestHook: Send + Sync {
    fn apply(&self, request: &mut OutgoingRequest);
}

/// One logical request, relative to the client's endpoints
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Bytes>,
    headers: HeaderMap,
    conditional: Option<bool>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            conditional: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Send `body` verbatim
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Send `body` as canonical JSON.
    ///
    /// Object keys are sorted, so logically equal bodies produce the same
    /// bytes and therefore share a cache entry and an in-flight bucket.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, RequestError> {
        let encode = |e| RequestError::Encode {
            source: Arc::new(e),
        };
        let mut value = serde_json::to_value(body).map_err(encode)?;
        value.sort_all_objects();
        let bytes = serde_json::to_vec(&value).map_err(encode)?;
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Add a header for this request only; invalid names or values are ignored
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Force ETag revalidation on or off, overriding the configured paths
    pub fn conditional(mut self, enabled: bool) -> Self {
        self.conditional = Some(enabled);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Cloneable handle; clones share the cache, the registry and the transport
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    config: ClientConfig,
    primary: Url,
    fallbacks: Vec<Url>,
    transport: Arc<dyn Transport>,
    cache: ConditionalCache,
    registry: Arc<InFlightRegistry>,
    hook: Option<Arc<dyn RequestHook>>,
}

impl ApiClient {
    /// Create a client sending over reqwest
    pub fn new(config: ClientConfig) -> Result<Self, RequestError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a client around a custom transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RequestError> {
        let primary = parse_endpoint(&config.base_url)?;
        let fallbacks = config
            .fallback_urls
            .iter()
            .map(|url| parse_endpoint(url))
            .collect::<Result<Vec<_>, _>>()?;
        if let CacheBackend::Bounded { max_bytes: 0 } = config.cache_config.backend {
            return Err(RequestError::Config(
                "bounded cache needs a non-zero byte budget".to_string(),
            ));
        }
        let cache = ConditionalCache::new(config.cache_config.clone());

        info!(
            base_url = %primary,
            fallbacks = fallbacks.len(),
            caching = config.cache_config.enabled,
            "API client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                primary,
                fallbacks,
                transport,
                cache,
                registry: InFlightRegistry::new(),
                hook: None,
            }),
        })
    }

    /// Install a hook applied to every outgoing request
    pub fn with_hook(self, hook: Arc<dyn RequestHook>) -> Self {
        self.rebuild(|inner| inner.hook = Some(hook))
    }

    /// Replace the conditional cache, e.g. with a custom provider
    pub fn with_cache(self, cache: ConditionalCache) -> Self {
        self.rebuild(|inner| inner.cache = cache)
    }

    fn rebuild(self, f: impl FnOnce(&mut ClientInner)) -> Self {
        let mut inner = Arc::unwrap_or_clone(self.inner);
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &ConditionalCache {
        &self.inner.cache
    }

    /// Number of distinct requests currently on the wire
    pub fn in_flight(&self) -> usize {
        self.inner.registry.in_flight()
    }

    /// Drop every stored validator and body
    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
    }

    /// Resolve `path` against the primary endpoint
    pub fn resolve(&self, path: &str) -> Result<Url, RequestError> {
        resolve(&self.inner.primary, path)
    }

    /// Execute and decode the body into `T`
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<ApiResponse<T>, RequestError> {
        self.execute_raw(request).await?.decode()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, RequestError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    /// Execute without decoding; failures are already classified
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path), level = "debug")]
    pub async fn execute_raw(&self, request: ApiRequest) -> Result<RawResponse, RequestError> {
        let url = self.resolve(&request.path)?;
        let key = ResourceKey::new(&request.method, &url, request.body.as_deref());

        let outcome = match self.inner.registry.join_or_begin(key) {
            Role::Follower(follower) => follower.wait().await,
            Role::Leader(guard) => {
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(async move { inner.lead(guard, request, url).await });
                match task.await {
                    Ok(outcome) => outcome,
                    // The guard was dropped with the task, followers got the same
                    Err(e) => {
                        warn!(error = %e, "Request task failed");
                        RawOutcome::TransportFailure(TransportError::Aborted)
                    }
                }
            }
        };

        debug!(outcome = outcome.kind(), "Request finished");
        outcome.into_raw_response()
    }
}

impl ClientInner {
    async fn lead(&self, guard: LeaderGuard, request: ApiRequest, url: Url) -> RawOutcome {
        let key = guard.key().clone();
        let conditional = request
            .conditional
            .unwrap_or_else(|| self.config.is_conditional(&request.path));

        // The 304 confirms the validator we sent, so serve the body read with it
        let cached = if conditional {
            self.cache.lookup(&key).await
        } else {
            None
        };

        let outcome = match self.send_with_fallback(&request, url, cached.as_ref()).await {
            Ok((target, response)) => self.classify(&key, target, response, conditional, cached).await,
            Err(err) => RawOutcome::TransportFailure(err),
        };

        let followers = guard.complete(outcome.clone());
        if followers > 0 {
            debug!(key = %key, followers, "Shared outcome with waiting callers");
        }
        outcome
    }

    /// Try the primary, then each fallback once, stopping at the first response
    async fn send_with_fallback(
        &self,
        request: &ApiRequest,
        primary_url: Url,
        cached: Option<&CacheEntry>,
    ) -> Result<(Url, TransportResponse), TransportError> {
        let mut targets = vec![primary_url];
        for base in &self.fallbacks {
            match resolve(base, &request.path) {
                Ok(url) => targets.push(url),
                Err(e) => warn!(fallback = %base, error = %e, "Skipping fallback endpoint"),
            }
        }

        let total = targets.len();
        let mut last_error = TransportError::Aborted;

        for (attempt, target) in targets.into_iter().enumerate() {
            let outgoing = self.build_request(request, target.clone(), cached);
            let started = Instant::now();

            match self.transport.send(outgoing).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(
                            host = target.host_str().unwrap_or_default(),
                            attempt = attempt + 1,
                            "Fallback endpoint answered"
                        );
                    }
                    return Ok((target, response));
                }
                Err(err) => {
                    warn!(
                        host = target.host_str().unwrap_or_default(),
                        attempt = attempt + 1,
                        total,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "Endpoint unreachable"
                    );
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }

    fn build_request(
        &self,
        request: &ApiRequest,
        url: Url,
        cached: Option<&CacheEntry>,
    ) -> OutgoingRequest {
        let mut headers = self.config.headers.clone();
        for (name, value) in request.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(entry) = cached {
            match HeaderValue::from_str(&entry.validator) {
                Ok(value) => {
                    headers.insert(IF_NONE_MATCH, value);
                }
                Err(e) => warn!(validator = %entry.validator, error = %e, "Unusable cached validator"),
            }
        }

        let mut outgoing = OutgoingRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
        };

        if let Some(hook) = &self.hook {
            hook.apply(&mut outgoing);
        }
        outgoing
    }

    async fn classify(
        &self,
        key: &ResourceKey,
        url: Url,
        response: TransportResponse,
        conditional: bool,
        cached: Option<CacheEntry>,
    ) -> RawOutcome {
        let TransportResponse {
            status,
            headers,
            body,
        } = response;

        if status == StatusCode::NOT_MODIFIED {
            return match cached {
                Some(entry) => {
                    debug!(key = %key, "Not modified, serving cached body");
                    RawOutcome::NotModified {
                        status,
                        headers,
                        body: entry.body,
                    }
                }
                None => {
                    warn!(url = %url, "Received 304 with nothing cached");
                    RawOutcome::NoCachedData {
                        url: url.to_string(),
                    }
                }
            };
        }

        if status.as_u16() >= 400 {
            return RawOutcome::ProtocolFailure {
                status,
                headers,
                body,
            };
        }

        // A response without a validator leaves any older entry in place
        if conditional && status.is_success() {
            if let Some(validator) = extract_validator(&headers) {
                self.cache.store(key.clone(), body.clone(), validator).await;
            }
        }

        RawOutcome::Success {
            status,
            headers,
            body,
        }
    }
}

/// Parse an endpoint, normalized so relative paths extend it
fn parse_endpoint(raw: &str) -> Result<Url, RequestError> {
    let mut url =
        Url::parse(raw).map_err(|e| RequestError::InvalidUrl(format!("'{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RequestError::InvalidUrl(format!(
            "'{raw}': unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Join `path` onto `base`; the result must stay under `base`
fn resolve(base: &Url, path: &str) -> Result<Url, RequestError> {
    let url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| RequestError::InvalidUrl(format!("cannot resolve '{path}' against {base}: {e}")))?;

    if !url.as_str().starts_with(base.as_str()) {
        return Err(RequestError::InvalidUrl(format!(
            "'{path}' escapes endpoint {base}"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;

    use crate::CacheConfig;
    use crate::outcome::ResponseSource;

    type Reply = Result<TransportResponse, TransportError>;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer() // Write to test output
            .try_init();
    }

    /// Transport answering from a closure of (request, call index)
    struct ScriptedTransport {
        script: Box<dyn Fn(&OutgoingRequest, usize) -> Reply + Send + Sync>,
        calls: AtomicUsize,
        seen: Mutex<Vec<OutgoingRequest>>,
        delay: Duration,
    }

    impl ScriptedTransport {
        fn new(script: impl Fn(&OutgoingRequest, usize) -> Reply + Send + Sync + 'static) -> Arc<Self> {
            Self::delayed(Duration::ZERO, script)
        }

        fn delayed(
            delay: Duration,
            script: impl Fn(&OutgoingRequest, usize) -> Reply + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn request(&self, index: usize) -> OutgoingRequest {
            self.seen.lock()[index].clone()
        }

        fn hosts(&self) -> Vec<String> {
            self.seen
                .lock()
                .iter()
                .map(|r| r.url.host_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.script)(&request, index)
        }
    }

    fn reply(status: u16, etag: Option<&str>, body: &str) -> Reply {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            headers.insert(reqwest::header::ETAG, HeaderValue::from_str(etag).unwrap());
        }
        Ok(TransportResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from(body.to_string()),
        })
    }

    fn refused() -> Reply {
        Err(TransportError::Connect("connection refused".to_string()))
    }

    fn client(transport: Arc<ScriptedTransport>) -> ApiClient {
        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/v1/")
            .build();
        ApiClient::with_transport(config, transport).unwrap()
    }

    fn if_none_match(request: &OutgoingRequest) -> Option<String> {
        request
            .headers
            .get(IF_NONE_MATCH)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Case {
        id: u32,
        title: String,
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_share_one_call() {
        init_tracing();
        let transport = ScriptedTransport::delayed(Duration::from_millis(100), |_, _| {
            reply(200, None, r#"{"id":1,"title":"Leak"}"#)
        });
        let client = client(transport.clone());

        let requests = (0..10).map(|_| client.get::<Case>("cases/1"));
        let results = futures::future::join_all(requests).await;

        assert_eq!(transport.calls(), 1);
        for result in results {
            let response = result.unwrap();
            assert_eq!(response.value, Case { id: 1, title: "Leak".to_string() });
            assert_eq!(response.source, ResponseSource::Network);
        }
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_requests_are_not_coalesced() {
        let transport = ScriptedTransport::delayed(Duration::from_millis(50), |_, _| reply(200, None, "{}"));
        let client = client(transport.clone());

        let (a, b, c) = tokio::join!(
            client.get::<serde_json::Value>("cases/1"),
            client.get::<serde_json::Value>("cases/2"),
            client.execute::<serde_json::Value>(ApiRequest::post("cases/1").body("{}")),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_sequential_requests_are_not_coalesced() {
        let transport = ScriptedTransport::new(|_, _| reply(200, None, "[]"));
        let client = client(transport.clone());

        client.get::<Vec<u32>>("cases").await.unwrap();
        client.get::<Vec<u32>>("cases").await.unwrap();

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_modified_serves_cached_body() {
        init_tracing();
        let transport = ScriptedTransport::new(|_, call| match call {
            0 => reply(200, Some("\"v1\""), r#"{"id":7,"title":"Pothole"}"#),
            _ => reply(304, None, ""),
        });
        let client = client(transport.clone());

        let first = client.get::<Case>("cases/7").await.unwrap();
        assert!(!first.is_revalidated());
        assert_eq!(if_none_match(&transport.request(0)), None);

        let second = client.get::<Case>("cases/7").await.unwrap();
        assert_eq!(if_none_match(&transport.request(1)).as_deref(), Some("\"v1\""));
        assert!(second.is_revalidated());
        assert_eq!(second.status, StatusCode::NOT_MODIFIED);
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn test_response_without_validator_keeps_previous_entry() {
        let transport = ScriptedTransport::new(|_, call| match call {
            0 => reply(200, Some("\"v1\""), r#""first""#),
            1 => reply(200, None, r#""second""#),
            _ => reply(304, None, ""),
        });
        let client = client(transport.clone());

        assert_eq!(client.get::<String>("status").await.unwrap().value, "first");
        assert_eq!(client.get::<String>("status").await.unwrap().value, "second");

        // The untagged response was not stored; the 304 confirms the old one
        let third = client.get::<String>("status").await.unwrap();
        assert_eq!(if_none_match(&transport.request(2)).as_deref(), Some("\"v1\""));
        assert_eq!(third.value, "first");
        assert!(third.is_revalidated());
    }

    #[tokio::test]
    async fn test_not_modified_without_cache_entry() {
        let transport = ScriptedTransport::new(|_, _| reply(304, None, ""));
        let client = client(transport);

        let err = client.get::<Case>("cases/1").await.unwrap_err();
        match err {
            RequestError::NoCachedData { url } => {
                assert_eq!(url, "https://api.example.com/v1/cases/1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_protocol_failures_carry_server_message() {
        let transport = ScriptedTransport::new(|request, _| match request.url.path() {
            "/v1/missing" => reply(404, None, r#"{"code":"E404","message":"not found"}"#),
            _ => reply(500, None, "oops"),
        });
        let client = client(transport.clone());

        match client.get::<Case>("missing").await.unwrap_err() {
            RequestError::Protocol {
                status,
                code,
                message,
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(code.as_deref(), Some("E404"));
                assert_eq!(message, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match client.get::<Case>("broken").await.unwrap_err() {
            RequestError::Protocol { status, message, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_protocol_failure_does_not_touch_cache() {
        let transport = ScriptedTransport::new(|_, call| match call {
            0 => reply(200, Some("\"v1\""), "1"),
            1 => reply(503, Some("\"v2\""), "busy"),
            _ => reply(304, None, ""),
        });
        let client = client(transport.clone());

        client.get::<u32>("counter").await.unwrap();
        assert!(client.get::<u32>("counter").await.is_err());

        let third = client.get::<u32>("counter").await.unwrap();
        assert_eq!(if_none_match(&transport.request(2)).as_deref(), Some("\"v1\""));
        assert_eq!(third.value, 1);
    }

    #[tokio::test]
    async fn test_fallback_endpoints_are_tried_in_order() {
        init_tracing();
        let transport = ScriptedTransport::new(|request, _| match request.url.host_str() {
            Some("b.example.com") => reply(200, None, r#"{"id":2,"title":"Graffiti"}"#),
            _ => refused(),
        });
        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/v1")
            .with_fallback_urls(["https://a.example.com/v1/", "https://b.example.com/v1/", "https://c.example.com/v1/"])
            .build();
        let client = ApiClient::with_transport(config, transport.clone()).unwrap();

        let response = client.get::<Case>("cases/2").await.unwrap();
        assert_eq!(response.value.id, 2);
        assert_eq!(transport.hosts(), vec!["api.example.com", "a.example.com", "b.example.com"]);
        assert_eq!(transport.request(2).url.as_str(), "https://b.example.com/v1/cases/2");
    }

    #[tokio::test]
    async fn test_unusual_status_codes_are_protocol_failures() {
        let transport = ScriptedTransport::new(|_, call| match call {
            0 => reply(600, Some("\"v6\""), r#""odd""#),
            _ => reply(200, None, r#""fresh""#),
        });
        let client = client(transport.clone());

        match client.get::<String>("weird").await.unwrap_err() {
            RequestError::Protocol { status, message, .. } => {
                assert_eq!(status.as_u16(), 600);
                assert_eq!(message, "\"odd\"");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.cache().is_empty().await);

        client.get::<String>("weird").await.unwrap();
        assert_eq!(if_none_match(&transport.request(1)), None);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_transport_failure() {
        let transport = ScriptedTransport::delayed(Duration::from_millis(100), |_, _| refused());
        let client = client(transport.clone());

        let requests = (0..8).map(|_| client.get::<Case>("cases/1"));
        let results = futures::future::join_all(requests).await;

        assert_eq!(transport.calls(), 1);
        for result in results {
            assert!(result.unwrap_err().is_offline());
        }
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_all_endpoints_unreachable() {
        let transport = ScriptedTransport::new(|_, _| refused());
        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/")
            .with_fallback_url("https://backup.example.com/")
            .build();
        let client = ApiClient::with_transport(config, transport.clone()).unwrap();

        let err = client.get::<Case>("cases").await.unwrap_err();
        assert!(err.is_offline());
        assert_eq!(transport.hosts(), vec!["api.example.com", "backup.example.com"]);
    }

    #[tokio::test]
    async fn test_protocol_failure_skips_fallbacks() {
        let transport = ScriptedTransport::new(|_, _| reply(401, None, r#"{"error":"expired"}"#));
        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/")
            .with_fallback_url("https://backup.example.com/")
            .build();
        let client = ApiClient::with_transport(config, transport.clone()).unwrap();

        let err = client.get::<Case>("me").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_followers_decode_independently() {
        let transport = ScriptedTransport::delayed(Duration::from_millis(100), |_, _| {
            reply(200, None, r#"{"id":3,"title":"Streetlight"}"#)
        });
        let client = client(transport.clone());

        let (typed, untyped, wrong) = tokio::join!(
            client.get::<Case>("cases/3"),
            client.get::<serde_json::Value>("cases/3"),
            client.get::<Vec<u32>>("cases/3"),
        );

        assert_eq!(transport.calls(), 1);
        assert_eq!(typed.unwrap().value.title, "Streetlight");
        assert_eq!(untyped.unwrap().value["id"], 3);
        assert!(matches!(wrong, Err(RequestError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_uncached_paths_skip_revalidation() {
        let transport = ScriptedTransport::new(|_, _| reply(200, Some("\"t1\""), r#"{"token":"abc"}"#));
        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/")
            .with_uncached_path("auth/")
            .build();
        let client = ApiClient::with_transport(config, transport.clone()).unwrap();

        client.get::<serde_json::Value>("auth/token").await.unwrap();
        client.get::<serde_json::Value>("auth/token").await.unwrap();

        assert_eq!(if_none_match(&transport.request(1)), None);
        assert!(client.cache().is_empty().await);

        // Per-request override opts back in
        client
            .execute::<serde_json::Value>(ApiRequest::get("auth/token").conditional(true))
            .await
            .unwrap();
        assert_eq!(client.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forgets_validators() {
        let transport = ScriptedTransport::new(|_, _| reply(200, Some("\"v1\""), "true"));
        let client = client(transport.clone());

        client.get::<bool>("flags").await.unwrap();
        client.clear_cache().await;
        client.get::<bool>("flags").await.unwrap();

        assert_eq!(if_none_match(&transport.request(1)), None);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_revalidates() {
        let transport = ScriptedTransport::new(|_, _| reply(200, Some("\"v1\""), "1"));
        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/")
            .with_cache_config(CacheConfig::disabled())
            .build();
        let client = ApiClient::with_transport(config, transport.clone()).unwrap();

        client.get::<u32>("n").await.unwrap();
        client.get::<u32>("n").await.unwrap();
        assert_eq!(if_none_match(&transport.request(1)), None);
    }

    #[tokio::test]
    async fn test_json_bodies_are_canonical() {
        #[derive(Serialize)]
        struct Report {
            zone: String,
            area: u32,
        }

        let from_struct = ApiRequest::post("reports")
            .json(&Report {
                zone: "north".to_string(),
                area: 4,
            })
            .unwrap();

        let mut map = BTreeMap::new();
        map.insert("area", serde_json::json!(4));
        map.insert("zone", serde_json::json!("north"));
        let from_map = ApiRequest::post("reports").json(&map).unwrap();

        assert_eq!(from_struct.body, from_map.body);
        assert_eq!(from_struct.body.as_deref(), Some(&br#"{"area":4,"zone":"north"}"#[..]));
    }

    #[tokio::test]
    async fn test_post_json_sends_body_and_headers() {
        let transport = ScriptedTransport::new(|request, _| {
            let echoed = String::from_utf8(request.body.clone().unwrap().to_vec()).unwrap();
            reply(201, None, &echoed)
        });
        let client = client(transport.clone());

        let response = client
            .post_json::<serde_json::Value, _>("reports", &serde_json::json!({"b": 1, "a": 2}))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.value, serde_json::json!({"a": 2, "b": 1}));
        let sent = transport.request(0);
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.headers.get("content-type").unwrap().to_str().unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_hook_and_request_headers() {
        struct BearerAuth;

        impl RequestHook for BearerAuth {
            fn apply(&self, request: &mut OutgoingRequest) {
                request
                    .headers
                    .insert("authorization", HeaderValue::from_static("Bearer secret"));
            }
        }

        let transport = ScriptedTransport::new(|_, _| reply(200, None, "null"));
        let client = client(transport.clone()).with_hook(Arc::new(BearerAuth));

        client
            .execute::<()>(ApiRequest::get("ping").header("x-trace", "abc"))
            .await
            .unwrap();

        let sent = transport.request(0);
        assert_eq!(sent.headers.get("authorization").unwrap().to_str().unwrap(), "Bearer secret");
        assert_eq!(sent.headers.get("x-trace").unwrap().to_str().unwrap(), "abc");
        assert_eq!(sent.headers.get("accept").unwrap().to_str().unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_request() {
        init_tracing();
        let transport = ScriptedTransport::delayed(Duration::from_millis(100), |_, _| {
            reply(200, Some("\"v1\""), "42")
        });
        let client = client(transport.clone());

        let abandoned = tokio::time::timeout(Duration::from_millis(10), client.get::<u32>("answer")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(client.in_flight(), 0);
        assert_eq!(transport.calls(), 1);
        assert_eq!(client.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_urls() {
        let transport = ScriptedTransport::new(|_, _| reply(200, None, "null"));

        let config = ClientConfig::builder().with_base_url("not a url").build();
        assert!(matches!(
            ApiClient::with_transport(config, transport.clone()),
            Err(RequestError::InvalidUrl(_))
        ));

        let config = ClientConfig::builder().with_base_url("ftp://files.example.com/").build();
        assert!(matches!(
            ApiClient::with_transport(config, transport.clone()),
            Err(RequestError::InvalidUrl(_))
        ));

        let config = ClientConfig::builder()
            .with_base_url("https://api.example.com/")
            .with_cache_config(CacheConfig {
                backend: CacheBackend::Bounded { max_bytes: 0 },
                ..CacheConfig::default()
            })
            .build();
        assert!(matches!(
            ApiClient::with_transport(config, transport.clone()),
            Err(RequestError::Config(_))
        ));

        let client = client(transport.clone());
        assert!(matches!(
            client.get::<()>("../../admin").await,
            Err(RequestError::InvalidUrl(_))
        ));
        assert!(matches!(
            client.get::<()>("https://elsewhere.example.com/x").await,
            Err(RequestError::InvalidUrl(_))
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_resolve_paths() {
        let base = parse_endpoint("https://api.example.com/v1").unwrap();
        assert_eq!(base.as_str(), "https://api.example.com/v1/");
        assert_eq!(
            resolve(&base, "/cases?page=2").unwrap().as_str(),
            "https://api.example.com/v1/cases?page=2"
        );
        assert_eq!(resolve(&base, "").unwrap().as_str(), "https://api.example.com/v1/");
    }
}
