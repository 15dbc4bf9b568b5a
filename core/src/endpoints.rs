//! Declarative endpoint catalog.
//!
//! Each operation is a row of data: its routes, the query parameters it
//! accepts, the path parameters it requires and how it takes a body. One
//! generic builder (`Endpoint::path_for`, used by `Client::build`) turns a row
//! plus caller input into a request.

use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::http::HttpMethod::{Delete, Get, Head, Post, Put};
use crate::query::{convert_value, encode_path_segment, Params};
use crate::serializer::{JSON, NDJSON};

/// Query parameters every endpoint accepts.
pub const COMMON_PARAMS: &[&str] = &["pretty", "human", "error_trace", "source", "filter_path"];

/// One URL template and the method used with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub template: &'static str,
    pub method: HttpMethod,
}

/// Whether an endpoint takes a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRule {
    None,
    Optional,
    Required,
}

#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub name: &'static str,
    /// Tried in order; the first whose placeholders are all supplied wins.
    pub routes: &'static [Route],
    /// Endpoint-specific query parameters, in wire order.
    pub params: &'static [&'static str],
    pub required: &'static [&'static str],
    pub body: BodyRule,
    pub content_type: &'static str,
    /// Acceptable response media types, sent comma-joined.
    pub accept: &'static [&'static str],
}

impl Endpoint {
    /// Allowed query parameters: the endpoint's own, then the common ones.
    pub fn allowed_params(&self) -> Vec<&'static str> {
        self.params.iter().chain(COMMON_PARAMS).copied().collect()
    }

    pub fn accept_header(&self) -> String {
        self.accept.join(",")
    }

    /// Render the first route whose placeholders all have values in `path`.
    ///
    /// Values are converted like query values and percent-encoded. A value
    /// of `.` or `..` is rejected, since URL parsing would collapse it as a
    /// dot-segment and change the target.
    pub fn path_for(&self, path: &Params) -> Result<(HttpMethod, String)> {
        for route in self.routes {
            if let Some(rendered) = render(route.template, path)? {
                return Ok((route.method, rendered));
            }
        }
        let missing = self
            .routes
            .last()
            .and_then(|route| placeholders(route.template).find(|name| value_of(path, name).is_none()))
            .unwrap_or("path");
        Err(Error::MissingParameter(missing.to_string()))
    }
}

/// Find an endpoint by its dotted name, e.g. `indices.create`.
pub fn find(name: &str) -> Option<&'static Endpoint> {
    CATALOG.iter().find(|e| e.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|e| e.name)
}

fn value_of(path: &Params, name: &str) -> Option<String> {
    path.get(name).and_then(convert_value)
}

fn placeholders(template: &'static str) -> impl Iterator<Item = &'static str> {
    template
        .split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
}

/// `Ok(None)` when a placeholder has no value.
fn render(template: &str, path: &Params) -> Result<Option<String>> {
    let mut out = String::with_capacity(template.len());
    for (i, segment) in template.split('/').enumerate() {
        if i > 0 {
            out.push('/');
        }
        let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            out.push_str(segment);
            continue;
        };
        let Some(value) = value_of(path, name) else {
            return Ok(None);
        };
        if value == "." || value == ".." {
            return Err(Error::InvalidUrl(format!(
                "path parameter {name} cannot be {value:?}"
            )));
        }
        out.push_str(&encode_path_segment(&value));
    }
    Ok(Some(out))
}

const fn route(template: &'static str, method: HttpMethod) -> Route {
    Route { template, method }
}

const JSON_ONLY: &[&str] = &[JSON];
const SEARCH_PARAMS: &[&str] = &[
    "q",
    "df",
    "default_operator",
    "from",
    "size",
    "sort",
    "_source",
    "_source_includes",
    "_source_excludes",
    "routing",
    "preference",
    "scroll",
    "search_type",
    "timeout",
    "track_total_hits",
    "allow_no_indices",
    "ignore_unavailable",
    "expand_wildcards",
];
const WRITE_PARAMS: &[&str] = &[
    "refresh",
    "routing",
    "timeout",
    "version",
    "version_type",
    "if_seq_no",
    "if_primary_term",
    "wait_for_active_shards",
    "pipeline",
];
const CAT_PARAMS: &[&str] = &["format", "h", "help", "s", "v", "local", "expand_wildcards"];

static CATALOG: &[Endpoint] = &[
    Endpoint {
        name: "info",
        routes: &[route("/", Get)],
        params: &[],
        required: &[],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "ping",
        routes: &[route("/", Head)],
        params: &[],
        required: &[],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "search",
        routes: &[route("/{index}/_search", Get), route("/_search", Get)],
        params: SEARCH_PARAMS,
        required: &[],
        body: BodyRule::Optional,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "count",
        routes: &[route("/{index}/_count", Get), route("/_count", Get)],
        params: &["q", "df", "routing", "min_score", "terminate_after", "ignore_unavailable"],
        required: &[],
        body: BodyRule::Optional,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "index",
        routes: &[route("/{index}/_doc/{id}", Put), route("/{index}/_doc", Post)],
        params: WRITE_PARAMS,
        required: &["index"],
        body: BodyRule::Required,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "create",
        routes: &[route("/{index}/_create/{id}", Put)],
        params: WRITE_PARAMS,
        required: &["id", "index"],
        body: BodyRule::Required,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "get",
        routes: &[route("/{index}/_doc/{id}", Get)],
        params: &[
            "preference",
            "realtime",
            "refresh",
            "routing",
            "_source",
            "_source_includes",
            "_source_excludes",
            "stored_fields",
            "version",
        ],
        required: &["id", "index"],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "exists",
        routes: &[route("/{index}/_doc/{id}", Head)],
        params: &["preference", "realtime", "refresh", "routing"],
        required: &["id", "index"],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "delete",
        routes: &[route("/{index}/_doc/{id}", Delete)],
        params: WRITE_PARAMS,
        required: &["id", "index"],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "update",
        routes: &[route("/{index}/_update/{id}", Post)],
        params: &["refresh", "retry_on_conflict", "routing", "timeout", "if_seq_no", "if_primary_term"],
        required: &["id", "index"],
        body: BodyRule::Required,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "bulk",
        routes: &[route("/{index}/_bulk", Post), route("/_bulk", Post)],
        params: &["pipeline", "refresh", "routing", "timeout", "wait_for_active_shards", "require_alias"],
        required: &[],
        body: BodyRule::Required,
        content_type: NDJSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "msearch",
        routes: &[route("/{index}/_msearch", Get), route("/_msearch", Get)],
        params: &["max_concurrent_searches", "search_type", "typed_keys", "rest_total_hits_as_int"],
        required: &[],
        body: BodyRule::Required,
        content_type: NDJSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "delete_by_query",
        routes: &[route("/{index}/_delete_by_query", Post)],
        params: &["conflicts", "refresh", "routing", "slices", "wait_for_completion", "timeout"],
        required: &["index"],
        body: BodyRule::Required,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "indices.create",
        routes: &[route("/{index}", Put)],
        params: &["master_timeout", "timeout", "wait_for_active_shards"],
        required: &["index"],
        body: BodyRule::Optional,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "indices.delete",
        routes: &[route("/{index}", Delete)],
        params: &["allow_no_indices", "expand_wildcards", "ignore_unavailable", "master_timeout", "timeout"],
        required: &["index"],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "indices.exists",
        routes: &[route("/{index}", Head)],
        params: &["allow_no_indices", "expand_wildcards", "ignore_unavailable", "local"],
        required: &["index"],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "indices.refresh",
        routes: &[route("/{index}/_refresh", Post), route("/_refresh", Post)],
        params: &["allow_no_indices", "expand_wildcards", "ignore_unavailable"],
        required: &[],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "cat.aliases",
        routes: &[route("/_cat/aliases/{name}", Get), route("/_cat/aliases", Get)],
        params: CAT_PARAMS,
        required: &[],
        body: BodyRule::None,
        content_type: JSON,
        accept: &["text/plain", JSON],
    },
    Endpoint {
        name: "cat.indices",
        routes: &[route("/_cat/indices/{index}", Get), route("/_cat/indices", Get)],
        params: CAT_PARAMS,
        required: &[],
        body: BodyRule::None,
        content_type: JSON,
        accept: &["text/plain", JSON],
    },
    Endpoint {
        name: "cluster.health",
        routes: &[route("/_cluster/health/{index}", Get), route("/_cluster/health", Get)],
        params: &["level", "local", "timeout", "wait_for_status", "wait_for_nodes", "wait_for_active_shards"],
        required: &[],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
    Endpoint {
        name: "connector.delete",
        routes: &[route("/_connector/{connector_id}", Delete)],
        params: &["delete_sync_jobs", "hard"],
        required: &["connector_id"],
        body: BodyRule::None,
        content_type: JSON,
        accept: JSON_ONLY,
    },
];
