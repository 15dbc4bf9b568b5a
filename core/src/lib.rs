//! Request construction and response handling for an Elasticsearch client.
//!
//! # Overview
//! Endpoint calls are described by a declarative catalog. For each call the
//! client appends the allow-listed query parameters, serializes the body as
//! JSON or newline-delimited JSON, injects version and client headers, and
//! hands the request to a `Transport`. The transport's answer is wrapped in
//! a `ResponseEnvelope` that verifies the product header, classifies the
//! status code, and decodes the body lazily.
//!
//! # Design
//! - `Client` is immutable and cheap to clone; the error policy
//!   (`throw_on_error`) is a client default that each call may override.
//! - Blocking and async dispatch are two separate entry points
//!   (`send` / `send_async`, `invoke` / `invoke_async`).
//! - Only `Transport` implementations perform I/O. `HttpTransport` is the
//!   default adapter; others are registered in a `TransportRegistry`.
//! - `envelope["key"]` is a convenience read that yields `Value::Null` for a
//!   missing key and for a body that does not decode. Use
//!   `ResponseEnvelope::get`, `pointer` or `as_array` when a `Decode` error
//!   must be seen.
//!
//! ```no_run
//! use es_client::{Call, Client, ClientConfig};
//! use serde_json::json;
//!
//! # fn main() -> es_client::Result<()> {
//! let client = Client::new(ClientConfig::from_env())?;
//! let response = client.invoke(
//!     "search",
//!     Call::new()
//!         .path("index", "articles")
//!         .query("size", 5)
//!         .body(json!({"query": {"match": {"title": "rust"}}})),
//! )?;
//! println!("{} hits", response["hits"]["total"]["value"]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod namespaces;
pub mod query;
pub mod request;
pub mod response;
pub mod serializer;
pub mod transport;
pub mod types;

pub use client::{Call, Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result, TransportError};
pub use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse};
pub use query::{add_query_string, check_required_parameters, Params};
pub use request::RequestFactory;
pub use response::ResponseEnvelope;
pub use serializer::body_serialize;
pub use transport::{HttpTransport, Transport, TransportRegistry};
