//! Transport collaborator: the only code that performs network I/O.
//!
//! # Design
//! `Transport` exposes a blocking and an async round-trip. The client never
//! spawns tasks or threads itself; the async path only awaits the future the
//! transport returns, so dropping the outer future drops the in-flight
//! request with it.
//!
//! Adapters are looked up by name in a `TransportRegistry` supplied to the
//! client builder. `HttpTransport` is registered as `"http"` by default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Mockable transport trait.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Execute `request`, blocking the calling thread until it completes.
    fn send_request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Execute `request` asynchronously.
    async fn send_async_request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Whether requests must carry an explicit `Host` header.
    fn requires_host_header(&self) -> bool {
        false
    }
}

/// Default adapter: `ureq` for blocking calls, `reqwest` for async calls.
///
/// Neither side turns HTTP error statuses into errors; classification is the
/// response envelope's job.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .new_agent();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { agent, client })
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn send_request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method(), url = %request.url(), "blocking send");
        let (parts, body) = request.into_http()?.into_parts();
        let response = match body {
            Some(body) => self
                .agent
                .run(http::Request::from_parts(parts, body.to_vec()))?,
            None => self.agent.run(http::Request::from_parts(parts, ()))?,
        };
        let (parts, mut body) = response.into_parts();
        // ureq caps reads at 10 MiB by default; reqwest has no cap.
        let bytes = body.with_config().limit(u64::MAX).read_to_vec()?;
        Ok(HttpResponse::new(parts.status.as_u16(), parts.headers, bytes))
    }

    async fn send_async_request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method(), url = %request.url(), "async send");
        let (parts, body) = request.into_http()?.into_parts();
        let mut builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body: Bytes = response.bytes().await?;
        Ok(HttpResponse::new(status, headers, body))
    }
}

/// Builds a transport from the client configuration.
pub type TransportFactory =
    Arc<dyn Fn(&ClientConfig) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync>;

/// Named transport factories consulted when a client is built.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    factories: HashMap<String, TransportFactory>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `HttpTransport` registered as `"http"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("http", |config| {
            Ok(Arc::new(HttpTransport::new(config)?) as Arc<dyn Transport>)
        });
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ClientConfig) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the transport registered under `name`.
    pub fn create(&self, name: &str, config: &ClientConfig) -> Result<Arc<dyn Transport>, TransportError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TransportError::UnknownAdapter(name.to_string()))?;
        factory(config)
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TransportRegistry")
            .field("adapters", &names)
            .finish()
    }
}
