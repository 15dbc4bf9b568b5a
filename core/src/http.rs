//! HTTP transport types exchanged with the transport collaborator.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! request-building layer produces `HttpRequest` values and the response layer
//! consumes `HttpResponse` values; only a `Transport` implementation touches
//! the network.
//!
//! `HttpRequest` is immutable once built. Adding a header consumes the request
//! and returns a new one, so a request handed to one call can never be changed
//! underneath another.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl From<HttpMethod> for http::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Head => http::Method::HEAD,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body as supplied by the caller.
///
/// `Value` bodies are serialized according to the request's `Content-Type`;
/// `Raw` bodies are already serialized and are sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Value(Value),
    Raw(Bytes),
}

impl Body {
    /// Empty structures, `null` and zero-length raw bodies carry nothing and
    /// are never attached to a request.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Value(Value::Null) => true,
            Body::Value(Value::Object(map)) => map.is_empty(),
            Body::Value(Value::Array(items)) => items.is_empty(),
            Body::Value(Value::String(s)) => s.is_empty(),
            Body::Value(_) => false,
            Body::Raw(bytes) => bytes.is_empty(),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Value(value)
    }
}

impl From<Vec<Value>> for Body {
    fn from(records: Vec<Value>) -> Self {
        Body::Value(Value::Array(records))
    }
}

impl From<String> for Body {
    fn from(raw: String) -> Self {
        Body::Raw(Bytes::from(raw))
    }
}

impl From<&'static str> for Body {
    fn from(raw: &'static str) -> Self {
        Body::Raw(Bytes::from_static(raw.as_bytes()))
    }
}

impl From<Bytes> for Body {
    fn from(raw: Bytes) -> Self {
        Body::Raw(raw)
    }
}

/// An outbound HTTP request described as plain data.
///
/// Built by `RequestFactory::create`. The transport is responsible for
/// executing it against the network and returning the matching
/// `HttpResponse`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl HttpRequest {
    pub(crate) fn new(method: HttpMethod, url: Url, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of `name` as a string, if present and valid
    /// UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns a request with `name` set to `value`, replacing any previous
    /// value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Convert into an `http::Request`, the common currency of the adapters.
    pub fn into_http(self) -> Result<http::Request<Option<Bytes>>, http::Error> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(self.method))
            .uri(self.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers);
        }
        builder.body(self.body)
    }
}

/// A raw HTTP response as returned by the transport.
///
/// Wrapped into a `ResponseEnvelope` before it reaches a caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            Url::parse("http://localhost:9200/_search").unwrap(),
            HeaderMap::new(),
            None,
        )
    }

    #[test]
    fn with_header_leaves_the_original_untouched() {
        let original = request();
        let copy = original
            .clone()
            .with_header(http::header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(original.header("accept").is_none());
        assert_eq!(copy.header("Accept"), Some("application/json"));
    }

    #[test]
    fn empty_bodies() {
        assert!(Body::from(json!({})).is_empty());
        assert!(Body::from(json!([])).is_empty());
        assert!(Body::from(Value::Null).is_empty());
        assert!(Body::from("").is_empty());
        assert!(!Body::from(json!({"query": {}})).is_empty());
        assert!(!Body::from(json!(0)).is_empty());
    }

    #[test]
    fn into_http_keeps_method_uri_and_headers() {
        let req = request().with_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let converted = req.into_http().unwrap();
        assert_eq!(converted.method(), http::Method::GET);
        assert_eq!(converted.uri(), "http://localhost:9200/_search");
        assert_eq!(converted.headers()["content-type"], "application/json");
        assert!(converted.body().is_none());
    }

    #[test]
    fn method_names() {
        assert_eq!(HttpMethod::Head.to_string(), "HEAD");
        assert_eq!(http::Method::from(HttpMethod::Delete), http::Method::DELETE);
    }
}
