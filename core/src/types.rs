//! Typed views of common response bodies.
//!
//! # Design
//! These mirror the fields callers usually need and ignore the rest, so new
//! server-side fields never break decoding. Use `ResponseEnvelope::as_array`
//! for anything not modelled here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoResponse {
    pub name: String,
    pub cluster_name: String,
    #[serde(default)]
    pub cluster_uuid: String,
    pub version: VersionInfo,
    #[serde(default)]
    pub tagline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub number: String,
    #[serde(default)]
    pub build_flavor: Option<String>,
}

/// Result of a single-document write (index, create, update, delete).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub result: String,
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
}

/// Result of a document lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub found: bool,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// Result of a bulk request. `errors` is true if any item failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub hits: Hits,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TotalHits {
    pub value: u64,
    pub relation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// Acknowledgement returned by index management calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledged {
    pub acknowledged: bool,
}
