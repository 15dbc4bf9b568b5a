//! Request dispatch for the search service.
//!
//! # Design
//! `Client` owns an immutable `RequestFactory` and a shared `Transport`. It
//! carries no mutable state between calls, so it is cheap to clone and safe
//! to share. Every operation funnels through two entry points:
//!
//! - `send` blocks the calling thread until the transport answers, then
//!   wraps and classifies the response.
//! - `send_async` returns a future that performs the same wrap-and-classify
//!   step once the transport's future resolves.
//!
//! Catalog operations are split into `build` (produces an `HttpRequest`) and
//! `invoke` / `invoke_async` (build, then send), so the request a call would
//! produce can be inspected without touching the network.

use std::future::Future;
use std::sync::Arc;

use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::endpoints::{self, BodyRule};
use crate::error::{Error, Result};
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse};
use crate::namespaces::{Cat, Indices};
use crate::query::{add_query_string, check_required_parameters, Params};
use crate::request::RequestFactory;
use crate::response::ResponseEnvelope;
use crate::transport::{Transport, TransportRegistry};
use crate::types::{BulkResponse, GetResponse, InfoResponse, SearchResponse, WriteResponse};

/// Caller input for one catalog operation.
#[derive(Debug, Clone, Default)]
pub struct Call {
    path: Params,
    query: Params,
    body: Option<Body>,
    headers: HeaderMap,
    throw_on_error: Option<bool>,
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a path parameter such as `index` or `id`.
    pub fn path(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Set a query parameter. Names the endpoint does not accept are dropped.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Merge a whole parameter map into the query parameters.
    pub fn query_params(mut self, params: Params) -> Self {
        self.query.extend(params);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a request header; it takes precedence over client defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override the client's error policy for this call only.
    pub fn throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.throw_on_error = Some(throw_on_error);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    factory: RequestFactory,
    transport: Arc<dyn Transport>,
    throw_on_error: bool,
}

impl Client {
    /// Create a client for `config`, using the default transport registry.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// The client-wide default error policy.
    pub fn throw_on_error(&self) -> bool {
        self.throw_on_error
    }

    /// A copy of this client with a different default error policy.
    pub fn with_throw_on_error(&self, throw_on_error: bool) -> Self {
        Self {
            throw_on_error,
            ..self.clone()
        }
    }

    pub fn factory(&self) -> &RequestFactory {
        &self.factory
    }

    /// Build a request through the client's factory.
    pub fn create_request(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HeaderMap,
        body: Option<Body>,
    ) -> Result<HttpRequest> {
        self.factory.create(method, url, headers, body)
    }

    /// Send `request` and block until the response is wrapped.
    ///
    /// `throw_on_error` overrides the client default for this call. `HEAD`
    /// requests never raise response errors.
    pub fn send(&self, request: HttpRequest, throw_on_error: Option<bool>) -> Result<ResponseEnvelope> {
        let throw_on_error = self.effective_policy(&request, throw_on_error);
        debug!(method = %request.method(), url = %request.url(), "dispatching (sync)");
        let response = self.transport.send_request(request)?;
        on_success(response, throw_on_error)
    }

    /// Send `request` without blocking.
    ///
    /// The returned future owns everything it needs. Dropping it before it
    /// completes drops the transport's in-flight request; no body is read.
    pub fn send_async(
        &self,
        request: HttpRequest,
        throw_on_error: Option<bool>,
    ) -> impl Future<Output = Result<ResponseEnvelope>> + Send + 'static {
        let throw_on_error = self.effective_policy(&request, throw_on_error);
        let transport = Arc::clone(&self.transport);
        async move {
            debug!(method = %request.method(), url = %request.url(), "dispatching (async)");
            let response = transport.send_async_request(request).await?;
            on_success(response, throw_on_error)
        }
    }

    /// Build the request a catalog operation would send.
    pub fn build(&self, name: &str, call: &Call) -> Result<HttpRequest> {
        let endpoint = endpoints::find(name).ok_or_else(|| Error::UnknownEndpoint(name.to_string()))?;
        check_required_parameters(endpoint.required, &call.path)?;
        let (mut method, path) = endpoint.path_for(&call.path)?;

        let body = call.body.clone().filter(|b| !b.is_empty());
        match (endpoint.body, &body) {
            (BodyRule::Required, None) => return Err(Error::MissingParameter("body".to_string())),
            (BodyRule::None, Some(_)) => {
                return Err(Error::Serialization(format!("{name} does not take a request body")))
            }
            _ => {}
        }
        if body.is_some() && method == HttpMethod::Get {
            method = HttpMethod::Post;
        }

        let url = add_query_string(&path, &call.query, &endpoint.allowed_params());
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(&endpoint.accept_header())?);
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(endpoint.content_type));
        }
        for (name, value) in &call.headers {
            headers.insert(name.clone(), value.clone());
        }
        self.factory.create(method, &url, headers, body)
    }

    /// Run a catalog operation in blocking mode.
    pub fn invoke(&self, name: &str, call: Call) -> Result<ResponseEnvelope> {
        let request = self.build(name, &call)?;
        self.send(request, call.throw_on_error)
    }

    /// Run a catalog operation in async mode.
    pub fn invoke_async(
        &self,
        name: &str,
        call: Call,
    ) -> impl Future<Output = Result<ResponseEnvelope>> + Send + 'static {
        let request = self.build(name, &call);
        let this = self.clone();
        async move { this.send_async(request?, call.throw_on_error).await }
    }

    pub fn indices(&self) -> Indices<'_> {
        Indices::new(self)
    }

    pub fn cat(&self) -> Cat<'_> {
        Cat::new(self)
    }

    pub fn info(&self) -> Result<InfoResponse> {
        self.invoke("info", Call::new())?.as_object()
    }

    /// True if the cluster answers `HEAD /` with a 2xx.
    pub fn ping(&self) -> Result<bool> {
        Ok(self.invoke("ping", Call::new())?.as_bool())
    }

    pub fn search(&self, index: &str, body: Value) -> Result<SearchResponse> {
        self.invoke("search", Call::new().path("index", index).body(body))?
            .as_object()
    }

    /// Index `document`, under `id` if given, otherwise with a generated id.
    pub fn index(&self, index: &str, id: Option<&str>, document: Value) -> Result<WriteResponse> {
        let mut call = Call::new().path("index", index).body(document);
        if let Some(id) = id {
            call = call.path("id", id);
        }
        self.invoke("index", call)?.as_object()
    }

    /// Fetch a document. A missing document is a `GetResponse` with
    /// `found: false`, not an error.
    pub fn get(&self, index: &str, id: &str) -> Result<GetResponse> {
        let call = Call::new().path("index", index).path("id", id).throw_on_error(false);
        let envelope = self.invoke("get", call)?;
        match envelope.status() {
            200 | 404 => envelope.as_object(),
            _ => Err(classify(envelope)),
        }
    }

    /// Send bulk `operations`, one record per action or source line.
    pub fn bulk(&self, index: Option<&str>, operations: Vec<Value>) -> Result<BulkResponse> {
        let mut call = Call::new().body(operations);
        if let Some(index) = index {
            call = call.path("index", index);
        }
        self.invoke("bulk", call)?.as_object()
    }

    fn effective_policy(&self, request: &HttpRequest, throw_on_error: Option<bool>) -> bool {
        request.method() != HttpMethod::Head && throw_on_error.unwrap_or(self.throw_on_error)
    }
}

/// Continuation run once a transport response is available, in both modes.
fn on_success(response: HttpResponse, throw_on_error: bool) -> Result<ResponseEnvelope> {
    ResponseEnvelope::from_response(response, throw_on_error)
}

fn classify(envelope: ResponseEnvelope) -> Error {
    if envelope.status() >= 500 {
        Error::ServerResponse(Box::new(envelope))
    } else {
        Error::ClientResponse(Box::new(envelope))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(e.to_string()))
}

/// Builds a `Client` from configuration and a transport registry.
#[derive(Debug)]
pub struct ClientBuilder {
    config: ClientConfig,
    registry: TransportRegistry,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: TransportRegistry::with_defaults(),
            transport: None,
        }
    }

    /// Look adapters up in `registry` instead of the default one.
    pub fn registry(mut self, registry: TransportRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `transport` directly, bypassing the registry.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client> {
        let base_url =
            Url::parse(&self.config.host).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.config.host)))?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => self.registry.create(&self.config.transport, &self.config)?,
        };

        let mut factory = RequestFactory::new(base_url)
            .with_default_headers(self.config.default_headers()?)
            .with_compatibility(self.config.compatible_with)
            .with_host_header(self.config.host_header || transport.requires_host_header());
        if let Some(version) = &self.config.api_version {
            factory = factory.with_api_version(version)?;
        }

        Ok(Client {
            factory,
            transport,
            throw_on_error: self.config.throw_on_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::response::{PRODUCT_HEADER, PRODUCT_NAME};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every request and answers with a canned response.
    #[derive(Debug)]
    struct Canned {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn respond(&self, request: HttpRequest) -> HttpResponse {
            self.seen.lock().unwrap().push(request);
            let mut headers = HeaderMap::new();
            headers.insert(PRODUCT_HEADER, HeaderValue::from_static(PRODUCT_NAME));
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            HttpResponse::new(self.status, headers, self.body)
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for Canned {
        fn send_request(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            Ok(self.respond(request))
        }

        async fn send_async_request(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            Ok(self.respond(request))
        }
    }

    fn client(transport: Arc<Canned>) -> Client {
        Client::builder(ClientConfig::default())
            .transport(transport)
            .build()
            .unwrap()
    }

    #[test]
    fn build_search_with_body_upgrades_to_post() {
        let c = client(Canned::new(200, "{}"));
        let req = c
            .build(
                "search",
                &Call::new()
                    .path("index", "logs")
                    .query("size", 5)
                    .query("refresh", true)
                    .body(json!({"query": {"match_all": {}}})),
            )
            .unwrap();
        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(req.url().as_str(), "http://localhost:9200/logs/_search?size=5");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(&req.body().unwrap()[..], br#"{"query":{"match_all":{}}}"#);
    }

    #[test]
    fn build_search_without_body_stays_get() {
        let c = client(Canned::new(200, "{}"));
        let req = c.build("search", &Call::new().query("q", "title:rust")).unwrap();
        assert_eq!(req.method(), HttpMethod::Get);
        assert_eq!(req.url().as_str(), "http://localhost:9200/_search?q=title%3Arust");
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn build_bulk_sends_ndjson() {
        let c = client(Canned::new(200, "{}"));
        let req = c
            .build(
                "bulk",
                &Call::new().body(vec![json!({"index": {"_index": "i"}}), json!({"a": 1})]),
            )
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/x-ndjson"));
        assert_eq!(
            &req.body().unwrap()[..],
            b"{\"index\":{\"_index\":\"i\"}}\n{\"a\":1}\n"
        );
    }

    #[test]
    fn build_rejects_missing_required_path_parameter() {
        let c = client(Canned::new(200, "{}"));
        let err = c.build("get", &Call::new().path("index", "i")).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref n) if n == "id"));
    }

    #[test]
    fn build_rejects_missing_required_body() {
        let c = client(Canned::new(200, "{}"));
        let err = c.build("update", &Call::new().path("index", "i").path("id", "1")).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref n) if n == "body"));
    }

    #[test]
    fn dot_segment_path_values_never_reach_the_transport() {
        let transport = Canned::new(200, "{}");
        let c = client(transport.clone());

        let err = c
            .invoke("delete", Call::new().path("index", "books").path("id", ".."))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)), "{err:?}");
        let err = c.build("search", &Call::new().path("index", "..")).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)), "{err:?}");
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn build_rejects_unknown_endpoint() {
        let c = client(Canned::new(200, "{}"));
        assert!(matches!(
            c.build("nope", &Call::new()),
            Err(Error::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn call_headers_override_endpoint_accept() {
        let c = client(Canned::new(200, "{}"));
        let req = c
            .build(
                "cat.aliases",
                &Call::new().header(ACCEPT, HeaderValue::from_static("application/json")),
            )
            .unwrap();
        assert_eq!(req.header("accept"), Some("application/json"));
        let req = c.build("cat.aliases", &Call::new()).unwrap();
        assert_eq!(req.header("accept"), Some("text/plain,application/json"));
    }

    #[test]
    fn send_raises_client_error_by_default() {
        let c = client(Canned::new(404, r#"{"found":false}"#));
        let err = c.invoke("get", Call::new().path("index", "i").path("id", "1")).unwrap_err();
        assert!(matches!(err, Error::ClientResponse(_)));
        assert_eq!(err.response().unwrap()["found"], json!(false));
    }

    #[test]
    fn per_call_override_beats_client_default() {
        let c = client(Canned::new(500, "{}"));
        let envelope = c
            .invoke("info", Call::new().throw_on_error(false))
            .unwrap();
        assert_eq!(envelope.status(), 500);

        let lenient = c.with_throw_on_error(false);
        assert!(!lenient.throw_on_error());
        assert!(lenient.invoke("info", Call::new()).is_ok());
        assert!(matches!(
            lenient.invoke("info", Call::new().throw_on_error(true)),
            Err(Error::ServerResponse(_))
        ));
    }

    #[test]
    fn head_never_raises() {
        let c = client(Canned::new(404, ""));
        let envelope = c
            .invoke(
                "indices.exists",
                Call::new().path("index", "missing").throw_on_error(true),
            )
            .unwrap();
        assert!(!envelope.as_bool());
        assert!(!c.indices().exists("missing").unwrap());
    }

    #[test]
    fn sync_and_async_agree() {
        let transport = Canned::new(200, r#"{"count":3}"#);
        let c = client(transport.clone());
        let sync = c.invoke("count", Call::new().path("index", "i")).unwrap();
        let sync_request = transport.last();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let async_ = rt
            .block_on(c.invoke_async("count", Call::new().path("index", "i")))
            .unwrap();
        let async_request = transport.last();

        assert_eq!(sync.status(), async_.status());
        assert_eq!(sync.as_array().unwrap(), async_.as_array().unwrap());
        assert_eq!(sync_request.url(), async_request.url());
        assert_eq!(sync_request.headers(), async_request.headers());
    }

    #[test]
    fn typed_wrappers_decode() {
        let c = client(Canned::new(
            200,
            r#"{"name":"node-1","cluster_name":"docker-cluster","cluster_uuid":"u","version":{"number":"8.15.0"},"tagline":"You Know, for Search"}"#,
        ));
        let info = c.info().unwrap();
        assert_eq!(info.cluster_name, "docker-cluster");
        assert_eq!(info.version.number, "8.15.0");
        assert!(c.ping().unwrap());
    }

    #[test]
    fn get_treats_not_found_as_a_value() {
        let c = client(Canned::new(404, r#"{"_index":"i","_id":"1","found":false}"#));
        let doc = c.get("i", "1").unwrap();
        assert!(!doc.found);
        assert!(doc.source.is_none());
    }

    #[test]
    fn builder_uses_registry() {
        let mut registry = TransportRegistry::new();
        let transport = Canned::new(200, "{}");
        let shared = transport.clone();
        registry.register("canned", move |_| Ok(shared.clone() as Arc<dyn Transport>));
        let c = Client::builder(ClientConfig::default().with_transport("canned"))
            .registry(registry)
            .build()
            .unwrap();
        c.invoke("cluster.health", Call::new()).unwrap();
        assert_eq!(transport.last().url().path(), "/_cluster/health");

        let err = Client::builder(ClientConfig::default().with_transport("missing"))
            .registry(TransportRegistry::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::UnknownAdapter(_))));
    }

    #[test]
    fn invalid_host_is_rejected() {
        let err = Client::builder(ClientConfig::default().with_host("not a url"))
            .transport(Canned::new(200, "{}"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
