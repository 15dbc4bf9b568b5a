//! Endpoint groups composed over a `Client`.
//!
//! Each group borrows the client it was created from and forwards to the
//! catalog through `Client::invoke`; groups hold no state of their own.

use serde_json::Value;

use crate::client::{Call, Client};
use crate::error::Result;
use crate::response::ResponseEnvelope;
use crate::types::Acknowledged;

/// Index management operations.
#[derive(Debug, Clone, Copy)]
pub struct Indices<'a> {
    client: &'a Client,
}

impl<'a> Indices<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Create `index`, with optional settings and mappings.
    pub fn create(&self, index: &str, body: Option<Value>) -> Result<Acknowledged> {
        let mut call = Call::new().path("index", index);
        if let Some(body) = body {
            call = call.body(body);
        }
        self.client.invoke("indices.create", call)?.as_object()
    }

    pub fn delete(&self, index: &str) -> Result<Acknowledged> {
        self.client
            .invoke("indices.delete", Call::new().path("index", index))?
            .as_object()
    }

    /// True if every index named by `index` exists.
    pub fn exists(&self, index: &str) -> Result<bool> {
        Ok(self
            .client
            .invoke("indices.exists", Call::new().path("index", index))?
            .as_bool())
    }

    /// Refresh `index`, or every index when `None`.
    pub fn refresh(&self, index: Option<&str>) -> Result<ResponseEnvelope> {
        let call = match index {
            Some(index) => Call::new().path("index", index),
            None => Call::new(),
        };
        self.client.invoke("indices.refresh", call)
    }
}

/// Compact, human-oriented listings.
#[derive(Debug, Clone, Copy)]
pub struct Cat<'a> {
    client: &'a Client,
}

impl<'a> Cat<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// List aliases, optionally filtered by `name`. Pass `format=json` in
    /// `call` for a decodable body; the default is a text table.
    pub fn aliases(&self, name: Option<&str>, call: Call) -> Result<ResponseEnvelope> {
        let call = match name {
            Some(name) => call.path("name", name),
            None => call,
        };
        self.client.invoke("cat.aliases", call)
    }

    pub fn indices(&self, index: Option<&str>, call: Call) -> Result<ResponseEnvelope> {
        let call = match index {
            Some(index) => call.path("index", index),
            None => call,
        };
        self.client.invoke("cat.indices", call)
    }
}
