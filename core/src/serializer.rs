//! JSON and newline-delimited JSON encoding for request and response bodies.
//!
//! The `Content-Type` decides the wire form. Unsupported types are a
//! programming error and fail loudly instead of falling back to JSON.

use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::Body;

pub const JSON: &str = "application/json";
pub const NDJSON: &str = "application/x-ndjson";
pub const VENDOR_JSON: &str = "application/vnd.elasticsearch+json";
pub const VENDOR_NDJSON: &str = "application/vnd.elasticsearch+x-ndjson";

/// The body encodings the service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    NdJson,
}

impl Format {
    /// Classify a `Content-Type` header value. Parameters such as
    /// `; charset=utf-8` or `; compatible-with=8` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains(NDJSON) || content_type.contains(VENDOR_NDJSON) {
            Some(Format::NdJson)
        } else if content_type.contains(JSON) || content_type.contains(VENDOR_JSON) {
            Some(Format::Json)
        } else {
            None
        }
    }
}

/// Serialize a structured body for the given content type.
///
/// JSON bodies become one compact document. Newline-delimited bodies must be
/// a sequence; every record is written compactly and followed by `\n`,
/// including the last one. Object keys keep the order the caller supplied.
pub fn body_serialize(body: &Value, content_type: &str) -> Result<String> {
    match Format::from_content_type(content_type) {
        Some(Format::Json) => to_compact(body),
        Some(Format::NdJson) => {
            let Value::Array(records) = body else {
                return Err(Error::Serialization(
                    "newline-delimited body must be a sequence of records".to_string(),
                ));
            };
            let mut out = String::new();
            for record in records {
                out.push_str(&to_compact(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        None => Err(Error::ContentType(content_type.to_string())),
    }
}

/// Encode a request body. Raw bodies pass through untouched.
pub(crate) fn encode(body: &Body, content_type: &str) -> Result<Bytes> {
    match body {
        Body::Raw(raw) => Ok(raw.clone()),
        Body::Value(value) => body_serialize(value, content_type).map(Bytes::from),
    }
}

/// Decode a response body according to its content type.
///
/// Newline-delimited bodies decode to a sequence of documents.
pub(crate) fn decode(body: &[u8], content_type: Option<&str>) -> Result<Value> {
    let content_type =
        content_type.ok_or_else(|| Error::Decode("no Content-Type in the response".to_string()))?;
    match Format::from_content_type(content_type) {
        Some(Format::Json) => {
            serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
        }
        Some(Format::NdJson) => body
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(|line| serde_json::from_slice(line).map_err(|e| Error::Decode(e.to_string())))
            .collect::<Result<Vec<Value>>>()
            .map(Value::Array),
        None => Err(Error::Decode(format!(
            "cannot decode a body of type {content_type}"
        ))),
    }
}

fn to_compact(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
}
