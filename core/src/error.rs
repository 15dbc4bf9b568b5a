//! Error types for the client core.
//!
//! # Design
//! Response-driven errors (`ClientResponse`, `ServerResponse`) carry the full
//! envelope, so a caller can still read the status code, headers and body of
//! a rejected call. Everything is surfaced to the caller; nothing in this
//! crate logs an error and carries on.

use thiserror::Error;

use crate::response::ResponseEnvelope;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by request building, dispatch and response decoding.
#[derive(Debug, Error)]
pub enum Error {
    /// The response did not come from the expected product.
    #[error(
        "the client noticed that the server is not Elasticsearch and we do not support this unknown product (status {status}, product header {product:?})"
    )]
    ProductCheck { status: u16, product: Option<String> },

    /// The server answered with a 4xx status.
    #[error("{} {}: {}", .0.status(), .0.reason_phrase(), .0.as_str())]
    ClientResponse(Box<ResponseEnvelope>),

    /// The server answered with a 5xx status.
    #[error("{} {}: {}", .0.status(), .0.reason_phrase(), .0.as_str())]
    ServerResponse(Box<ResponseEnvelope>),

    /// The response body could not be decoded into the requested view.
    #[error("cannot decode response body: {0}")]
    Decode(String),

    /// A request body was supplied with a missing or unsupported content type.
    #[error("unsupported content type: {0}")]
    ContentType(String),

    /// A required parameter was absent at call time.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// The request body could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// No endpoint with this name exists in the catalog.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// The envelope carried by a classified response error.
    pub fn response(&self) -> Option<&ResponseEnvelope> {
        match self {
            Error::ClientResponse(envelope) | Error::ServerResponse(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// The HTTP status code behind this error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ProductCheck { status, .. } => Some(*status),
            _ => self.response().map(ResponseEnvelope::status),
        }
    }
}

/// Errors raised by the transport collaborator before a response exists.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The blocking adapter failed to complete the round-trip.
    #[error("blocking request failed: {0}")]
    Blocking(#[from] ureq::Error),

    /// The async adapter failed to complete the round-trip.
    #[error("async request failed: {0}")]
    Async(#[from] reqwest::Error),

    /// The request could not be converted for the adapter.
    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    /// No adapter is registered under this name.
    #[error("no transport registered under {0:?}")]
    UnknownAdapter(String),

    /// Failed to build an adapter.
    #[error("failed to build transport: {0}")]
    Build(String),
}
