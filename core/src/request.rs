//! Assembles transport-level requests from method, URL, headers and body.
//!
//! # Design
//! `RequestFactory` is built once per client and is immutable afterwards. It
//! owns the base URL and the headers computed at construction (user agent,
//! client meta, authorization, API version). Headers supplied for a single
//! call always win over those defaults.

use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, HOST};
use url::Url;

use crate::error::{Error, Result};
use crate::http::{Body, HttpMethod, HttpRequest};
use crate::serializer::{self, Format};

/// Header naming the API contract version the client targets.
pub const API_VERSION_HEADER: &str = "elastic-api-version";

#[derive(Debug, Clone)]
pub struct RequestFactory {
    base_url: Url,
    default_headers: HeaderMap,
    api_version: Option<HeaderValue>,
    compatible_with: Option<u8>,
    host_header: bool,
}

impl RequestFactory {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            default_headers: HeaderMap::new(),
            api_version: None,
            compatible_with: None,
            host_header: false,
        }
    }

    /// Headers added to every request unless the call sets them itself.
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn with_api_version(mut self, version: &str) -> Result<Self> {
        let value = HeaderValue::from_str(version)
            .map_err(|e| Error::InvalidHeader(format!("{API_VERSION_HEADER}: {e}")))?;
        self.api_version = Some(value);
        Ok(self)
    }

    /// Rewrite JSON media types to the vendor types pinned to `major`.
    pub fn with_compatibility(mut self, major: Option<u8>) -> Self {
        self.compatible_with = major;
        self
    }

    /// Set `Host` explicitly, for transports that do not populate it.
    pub fn with_host_header(mut self, enabled: bool) -> Self {
        self.host_header = enabled;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a request. `url` is either absolute or a path joined to the base
    /// URL.
    ///
    /// A non-empty body requires a `Content-Type` in `headers`; it is
    /// serialized for that type. Empty or absent bodies attach nothing.
    pub fn create(
        &self,
        method: HttpMethod,
        url: &str,
        mut headers: HeaderMap,
        body: Option<Body>,
    ) -> Result<HttpRequest> {
        let url = self.resolve(url)?;

        let body = match body.filter(|b| !b.is_empty()) {
            None => None,
            Some(body) => {
                let content_type = headers
                    .get(CONTENT_TYPE)
                    .ok_or_else(|| {
                        Error::ContentType("a request body requires a Content-Type header".into())
                    })?
                    .to_str()
                    .map_err(|e| Error::InvalidHeader(format!("content-type: {e}")))?;
                Some(serializer::encode(&body, content_type)?)
            }
        };

        if let Some(major) = self.compatible_with {
            compatibility_headers(&mut headers, major)?;
        }
        for (name, value) in &self.default_headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        if let Some(version) = &self.api_version {
            let name = HeaderName::from_static(API_VERSION_HEADER);
            if !headers.contains_key(&name) {
                headers.insert(name, version.clone());
            }
        }
        if self.host_header && !headers.contains_key(HOST) {
            if let Some(host) = host_value(&url) {
                let value = HeaderValue::from_str(&host)
                    .map_err(|e| Error::InvalidHeader(format!("host: {e}")))?;
                headers.insert(HOST, value);
            }
        }

        Ok(HttpRequest::new(method, url, headers, body))
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = url.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))
    }
}

/// `host[:port]`, with the port only when it is not the scheme's default.
fn host_value(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn compatibility_headers(headers: &mut HeaderMap, major: u8) -> Result<()> {
    for name in [ACCEPT, CONTENT_TYPE] {
        let Some(current) = headers.get(&name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let rewritten: Vec<String> = current
            .split(',')
            .map(|part| match Format::from_content_type(part) {
                Some(Format::Json) => {
                    format!("{}; compatible-with={major}", serializer::VENDOR_JSON)
                }
                Some(Format::NdJson) => {
                    format!("{}; compatible-with={major}", serializer::VENDOR_NDJSON)
                }
                None => part.trim().to_string(),
            })
            .collect();
        let value = HeaderValue::from_str(&rewritten.join(","))
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(())
}
