//! Query-string and parameter helpers shared by every endpoint.
//!
//! Callers hand over one loosely-typed parameter map. Each endpoint declares
//! the names it accepts; only those names ever reach the wire, in the order
//! the endpoint declares them.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{Error, Result};

/// Parameter map supplied by callers, keyed by wire name.
pub type Params = serde_json::Map<String, Value>;

/// Keys that never become query parameters, even when allow-listed.
pub const RESERVED_KEYS: [&str; 2] = ["body", "client"];

/// Characters left as-is in a path segment: the RFC 3986 unreserved set.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Append the allow-listed subset of `params` to `url` as a query string.
///
/// Booleans render as `true`/`false` and sequences are comma-joined. Missing
/// or empty values are skipped; if nothing survives, `url` is returned
/// unchanged.
pub fn add_query_string(url: &str, params: &Params, allowed: &[&str]) -> String {
    let mut seen: Vec<&str> = Vec::with_capacity(allowed.len());
    let mut query = form_urlencoded::Serializer::new(String::new());
    for &name in allowed {
        if RESERVED_KEYS.contains(&name) || seen.contains(&name) {
            continue;
        }
        seen.push(name);
        if let Some(value) = params.get(name).and_then(convert_value) {
            query.append_pair(name, &value);
        }
    }
    let query = query.finish();
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

/// Fail with `MissingParameter` for the first name in `required` that has no
/// value in `params`.
pub fn check_required_parameters(required: &[&str], params: &Params) -> Result<()> {
    match required
        .iter()
        .find(|name| params.get(**name).and_then(convert_value).is_none())
    {
        Some(name) => Err(Error::MissingParameter((*name).to_string())),
        None => Ok(()),
    }
}

/// Render a parameter value the way the service expects it on the wire.
///
/// Returns `None` for values that count as absent.
pub(crate) fn convert_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(convert_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(","))
            }
        }
        Value::Object(map) if map.is_empty() => None,
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Percent-encode a dynamic path component.
pub(crate) fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
