//! Read-only wrapper around a raw transport response.
//!
//! # Design
//! Construction verifies the product marker header and classifies the status
//! code. The body is decoded lazily: the text view and the decoded value are
//! each computed at most once per envelope and then served from a cache.
//! Typed views (`as_object`) deserialize from the cached value, so decoding
//! the wire bytes happens once no matter how many views are requested.
//!
//! The envelope exposes lookups only. It implements `Index<&str>` but not
//! `IndexMut`, so writing through the index view does not compile:
//!
//! ```compile_fail
//! # fn demo(mut envelope: es_client::ResponseEnvelope) {
//! envelope["foo"] = serde_json::json!("x");
//! # }
//! ```

use std::fmt;
use std::ops::Index;
use std::sync::OnceLock;

use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_TYPE};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::serializer;

/// Header carrying the name of the product that produced the response.
pub const PRODUCT_HEADER: &str = "x-elastic-product";

/// The only value of `PRODUCT_HEADER` this client accepts.
pub const PRODUCT_NAME: &str = "Elasticsearch";

static NULL: Value = Value::Null;

/// A verified, classified response with lazy decoded views of its body.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    text: OnceLock<String>,
    decoded: OnceLock<Value>,
}

impl ResponseEnvelope {
    /// Wrap `response`, verifying its origin and classifying its status.
    ///
    /// A response without the product marker always fails with
    /// `ProductCheck`, whatever its status. When `throw_on_error` is set, 4xx and 5xx responses
    /// fail with `ClientResponse` and `ServerResponse`; otherwise the envelope
    /// is returned regardless of status.
    pub fn from_response(response: HttpResponse, throw_on_error: bool) -> Result<Self> {
        let status = StatusCode::from_u16(response.status)
            .map_err(|e| Error::Decode(format!("invalid status {}: {e}", response.status)))?;
        product_check(status, &response.headers)?;

        let envelope = Self {
            status,
            headers: response.headers,
            body: response.body,
            text: OnceLock::new(),
            decoded: OnceLock::new(),
        };
        debug!(status = status.as_u16(), throw_on_error, "response classified");
        if !throw_on_error {
            return Ok(envelope);
        }
        if status.is_client_error() {
            return Err(Error::ClientResponse(Box::new(envelope)));
        }
        if status.is_server_error() {
            return Err(Error::ServerResponse(Box::new(envelope)));
        }
        Ok(envelope)
    }

    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Canonical reason phrase for the status code, or an empty string.
    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// All values of `name` joined with `", "`, or `None` if absent.
    pub fn header_line(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// The undecoded body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// True iff the status code is in the 2xx band. Never fails.
    pub fn as_bool(&self) -> bool {
        self.status.is_success()
    }

    /// The body as text. Invalid UTF-8 sequences are replaced.
    pub fn as_str(&self) -> &str {
        self.text.get_or_init(|| {
            trace!(len = self.body.len(), "caching body text");
            String::from_utf8_lossy(&self.body).into_owned()
        })
    }

    /// The body decoded into a generic JSON value.
    ///
    /// The decode runs on first access only; later calls return the same
    /// cached value.
    pub fn as_array(&self) -> Result<&Value> {
        if let Some(value) = self.decoded.get() {
            return Ok(value);
        }
        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let value = serializer::decode(&self.body, content_type)?;
        trace!("caching decoded body");
        Ok(self.decoded.get_or_init(|| value))
    }

    /// The body deserialized into `T`, built from the cached decoded value.
    pub fn as_object<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(self.as_array()?).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Look up a top-level field of the decoded body.
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        Ok(self.as_array()?.get(key))
    }

    /// Look up a nested field with a JSON pointer such as `/hits/total/value`.
    pub fn pointer(&self, pointer: &str) -> Result<Option<&Value>> {
        Ok(self.as_array()?.pointer(pointer))
    }

    /// A copy of this envelope with a different status code.
    ///
    /// No product check or classification runs on the copy.
    pub fn with_status(&self, status: u16) -> Result<Self> {
        let status = StatusCode::from_u16(status)
            .map_err(|e| Error::Decode(format!("invalid status {status}: {e}")))?;
        Ok(Self {
            status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            text: OnceLock::new(),
            decoded: OnceLock::new(),
        })
    }
}

/// Index-style read access into the decoded body. Missing keys and
/// undecodable bodies yield `Value::Null`; `get` and `pointer` return the
/// decode error instead.
impl Index<&str> for ResponseEnvelope {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        match self.as_array() {
            Ok(value) => value.get(key).unwrap_or(&NULL),
            Err(_) => &NULL,
        }
    }
}

impl fmt::Display for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn product_check(status: StatusCode, headers: &HeaderMap) -> Result<()> {
    let product = headers.get(PRODUCT_HEADER).and_then(|v| v.to_str().ok());
    if product == Some(PRODUCT_NAME) {
        return Ok(());
    }
    Err(Error::ProductCheck {
        status: status.as_u16(),
        product: product.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde::Deserialize;
    use serde_json::json;
    use test_case::test_case;

    fn headers(content_type: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(PRODUCT_HEADER, HeaderValue::from_static(PRODUCT_NAME));
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        headers
    }

    fn json_response(status: u16, body: &'static str) -> HttpResponse {
        HttpResponse::new(status, headers(Some("application/json")), body)
    }

    fn envelope(body: &'static str) -> ResponseEnvelope {
        ResponseEnvelope::from_response(json_response(200, body), true).unwrap()
    }

    #[test_case(true; "throwing")]
    #[test_case(false; "not throwing")]
    fn missing_product_header_always_fails(throw_on_error: bool) {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let response = HttpResponse::new(200, h, "{}");
        let err = ResponseEnvelope::from_response(response, throw_on_error).unwrap_err();
        assert!(matches!(err, Error::ProductCheck { status: 200, product: None }));
    }

    #[test]
    fn product_check_runs_before_classification() {
        let response = HttpResponse::new(502, HeaderMap::new(), "<html>bad gateway</html>");
        let err = ResponseEnvelope::from_response(response, false).unwrap_err();
        assert!(matches!(err, Error::ProductCheck { status: 502, .. }));
    }

    #[test]
    fn wrong_product_fails() {
        let mut h = HeaderMap::new();
        h.insert(PRODUCT_HEADER, HeaderValue::from_static("OpenSearch"));
        let err = ResponseEnvelope::from_response(HttpResponse::new(200, h, "{}"), false)
            .unwrap_err();
        assert!(
            matches!(err, Error::ProductCheck { product: Some(ref p), .. } if p == "OpenSearch")
        );
    }

    #[test]
    fn client_error_can_be_suppressed() {
        let envelope =
            ResponseEnvelope::from_response(json_response(400, r#"{"error":"bad"}"#), false)
                .unwrap();
        assert_eq!(envelope.status(), 400);
        assert!(!envelope.as_bool());
    }

    #[test]
    fn client_error_carries_the_envelope() {
        let err = ResponseEnvelope::from_response(json_response(404, r#"{"found":false}"#), true)
            .unwrap_err();
        assert!(matches!(err, Error::ClientResponse(_)));
        assert_eq!(err.status(), Some(404));
        let envelope = err.response().unwrap();
        assert_eq!(envelope["found"], json!(false));
        assert_eq!(err.to_string(), r#"404 Not Found: {"found":false}"#);
    }

    #[test]
    fn server_error_carries_the_envelope() {
        let err = ResponseEnvelope::from_response(json_response(503, "{}"), true).unwrap_err();
        assert!(matches!(err, Error::ServerResponse(_)));
        assert_eq!(err.status(), Some(503));
    }

    #[test_case(101)]
    #[test_case(204)]
    #[test_case(304)]
    fn other_bands_pass_through(status: u16) {
        let envelope = ResponseEnvelope::from_response(json_response(status, ""), true).unwrap();
        assert_eq!(envelope.status(), status);
    }

    #[test]
    fn decode_is_memoized() {
        let envelope = envelope(r#"{"took":3,"hits":{"total":{"value":1}}}"#);
        let first = envelope.as_array().unwrap();
        let second = envelope.as_array().unwrap();
        assert_eq!(first, second);
        assert!(std::ptr::eq(first, second), "second call decoded again");
        assert!(std::ptr::eq(envelope.as_str(), envelope.as_str()));
    }

    #[test]
    fn typed_view_shares_the_decode() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Took {
            took: u32,
        }
        let envelope = envelope(r#"{"took":3}"#);
        let cached = envelope.as_array().unwrap() as *const Value;
        let took: Took = envelope.as_object().unwrap();
        assert_eq!(took, Took { took: 3 });
        assert!(std::ptr::eq(cached, envelope.as_array().unwrap()));
    }

    #[test]
    fn malformed_body_fails_to_decode() {
        let envelope = envelope("<html>oops</html>");
        assert!(matches!(envelope.as_array(), Err(Error::Decode(_))));
        assert_eq!(envelope.as_str(), "<html>oops</html>");
        assert_eq!(envelope["anything"], Value::Null);
        assert!(matches!(envelope.get("anything"), Err(Error::Decode(_))));
        assert!(matches!(envelope.pointer("/anything"), Err(Error::Decode(_))));
    }

    #[test]
    fn plain_text_is_not_decodable() {
        let response = HttpResponse::new(200, headers(Some("text/plain")), "alias index\n");
        let envelope = ResponseEnvelope::from_response(response, true).unwrap();
        assert!(matches!(envelope.as_array(), Err(Error::Decode(_))));
        assert_eq!(envelope.to_string(), "alias index\n");
    }

    #[test]
    fn index_and_lookups() {
        let envelope = envelope(r#"{"hits":{"total":{"value":7}},"timed_out":false}"#);
        assert_eq!(envelope["timed_out"], json!(false));
        assert_eq!(envelope["missing"], Value::Null);
        assert_eq!(envelope.get("timed_out").unwrap(), Some(&json!(false)));
        assert_eq!(envelope.pointer("/hits/total/value").unwrap(), Some(&json!(7)));
    }

    #[test]
    fn with_status_returns_a_new_envelope() {
        let envelope = envelope(r#"{"acknowledged":true}"#);
        let moved = envelope.with_status(404).unwrap();
        assert_eq!(envelope.status(), 200);
        assert_eq!(moved.status(), 404);
        assert!(!moved.as_bool());
        assert_eq!(moved.as_str(), envelope.as_str());
        assert_eq!(moved.headers(), envelope.headers());
    }

    #[test]
    fn header_line_joins_values() {
        let mut h = headers(None);
        h.append("warning", HeaderValue::from_static("299 a"));
        h.append("warning", HeaderValue::from_static("299 b"));
        let envelope = ResponseEnvelope::from_response(HttpResponse::new(200, h, ""), true).unwrap();
        assert!(envelope.has_header("Warning"));
        assert_eq!(envelope.header_line("warning").as_deref(), Some("299 a, 299 b"));
        assert_eq!(envelope.header_line("x-missing"), None);
        assert_eq!(envelope.reason_phrase(), "OK");
    }

    #[test]
    fn ndjson_body_decodes_to_sequence() {
        let response = HttpResponse::new(
            200,
            headers(Some("application/x-ndjson")),
            "{\"a\":1}\n{\"a\":2}\n",
        );
        let envelope = ResponseEnvelope::from_response(response, true).unwrap();
        assert_eq!(envelope.as_array().unwrap(), &json!([{"a": 1}, {"a": 2}]));
    }
}
