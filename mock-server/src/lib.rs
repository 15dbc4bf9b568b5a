use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const PRODUCT_HEADER: &str = "x-elastic-product";
pub const PRODUCT_NAME: &str = "Elasticsearch";

/// Size of the padding served by `/_mock/large`, above common client read caps.
pub const LARGE_BODY_BYTES: usize = 11 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    pub cluster_name: String,
    pub cluster_uuid: String,
    pub version: Value,
    pub tagline: String,
}

/// Index name → document id → source.
pub type Db = Arc<RwLock<HashMap<String, BTreeMap<String, Value>>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    let search = Router::new()
        .route("/", get(info).head(ping))
        .route("/_bulk", post(bulk))
        .route("/_cat/aliases", get(cat_aliases))
        .route("/_cluster/health", get(cluster_health))
        .route("/_mock/echo", any(echo))
        .route("/_mock/boom", any(boom))
        .route("/_mock/large", get(large))
        .route("/{index}", put(create_index).delete(delete_index).head(index_exists))
        .route("/{index}/_bulk", post(bulk_into))
        .route("/{index}/_search", get(search).post(search))
        .route("/{index}/_count", get(count).post(count))
        .route("/{index}/_refresh", post(refresh))
        .route("/{index}/_doc", post(index_auto_id))
        .route(
            "/{index}/_doc/{id}",
            put(index_doc).get(get_doc).delete(delete_doc).head(doc_exists),
        )
        .layer(middleware::map_response(product_header))
        .with_state(db);
    // Answers like a proxy in front of the cluster would: no product header.
    let foreign = Router::new().route("/_mock/foreign", any(foreign));
    search.merge(foreign)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn product_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(PRODUCT_HEADER, HeaderValue::from_static(PRODUCT_NAME));
    response
}

fn error(status: StatusCode, kind: &str, reason: String) -> Response {
    let body = json!({
        "error": {"root_cause": [{"type": kind, "reason": reason}], "type": kind, "reason": reason},
        "status": status.as_u16(),
    });
    (status, Json(body)).into_response()
}

fn index_not_found(index: &str) -> Response {
    error(
        StatusCode::NOT_FOUND,
        "index_not_found_exception",
        format!("no such index [{index}]"),
    )
}

async fn info() -> Json<Info> {
    Json(Info {
        name: "mock-node".to_string(),
        cluster_name: "mock-cluster".to_string(),
        cluster_uuid: Uuid::nil().to_string(),
        version: json!({"number": "8.15.0", "build_flavor": "default"}),
        tagline: "You Know, for Search".to_string(),
    })
}

async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn create_index(State(db): State<Db>, Path(index): Path<String>) -> Response {
    let mut indices = db.write().await;
    if indices.contains_key(&index) {
        return error(
            StatusCode::BAD_REQUEST,
            "resource_already_exists_exception",
            format!("index [{index}] already exists"),
        );
    }
    indices.insert(index.clone(), BTreeMap::new());
    Json(json!({"acknowledged": true, "shards_acknowledged": true, "index": index})).into_response()
}

async fn delete_index(State(db): State<Db>, Path(index): Path<String>) -> Response {
    match db.write().await.remove(&index) {
        Some(_) => Json(json!({"acknowledged": true})).into_response(),
        None => index_not_found(&index),
    }
}

async fn index_exists(State(db): State<Db>, Path(index): Path<String>) -> StatusCode {
    if db.read().await.contains_key(&index) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn refresh(Path(_index): Path<String>) -> Json<Value> {
    Json(json!({"_shards": {"total": 1, "successful": 1, "failed": 0}}))
}

async fn store(db: &Db, index: &str, id: String, source: Value) -> Response {
    let mut indices = db.write().await;
    let docs = indices.entry(index.to_string()).or_default();
    let result = if docs.insert(id.clone(), source).is_some() {
        "updated"
    } else {
        "created"
    };
    let status = if result == "created" {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({"_index": index, "_id": id, "_version": 1, "result": result})),
    )
        .into_response()
}

async fn index_doc(
    State(db): State<Db>,
    Path((index, id)): Path<(String, String)>,
    Json(source): Json<Value>,
) -> Response {
    store(&db, &index, id, source).await
}

async fn index_auto_id(
    State(db): State<Db>,
    Path(index): Path<String>,
    Json(source): Json<Value>,
) -> Response {
    store(&db, &index, Uuid::new_v4().simple().to_string(), source).await
}

async fn get_doc(State(db): State<Db>, Path((index, id)): Path<(String, String)>) -> Response {
    let indices = db.read().await;
    let Some(docs) = indices.get(&index) else {
        return index_not_found(&index);
    };
    match docs.get(&id) {
        Some(source) => Json(json!({
            "_index": index, "_id": id, "_version": 1, "found": true, "_source": source,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"_index": index, "_id": id, "found": false})),
        )
            .into_response(),
    }
}

async fn doc_exists(State(db): State<Db>, Path((index, id)): Path<(String, String)>) -> StatusCode {
    let found = db
        .read()
        .await
        .get(&index)
        .is_some_and(|docs| docs.contains_key(&id));
    if found {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn delete_doc(State(db): State<Db>, Path((index, id)): Path<(String, String)>) -> Response {
    let removed = db
        .write()
        .await
        .get_mut(&index)
        .and_then(|docs| docs.remove(&id));
    let (status, result) = match removed {
        Some(_) => (StatusCode::OK, "deleted"),
        None => (StatusCode::NOT_FOUND, "not_found"),
    };
    (status, Json(json!({"_index": index, "_id": id, "result": result}))).into_response()
}

/// Matches every document of the index; the query itself is ignored.
async fn search(State(db): State<Db>, Path(index): Path<String>) -> Response {
    let indices = db.read().await;
    let Some(docs) = indices.get(&index) else {
        return index_not_found(&index);
    };
    let hits: Vec<Value> = docs
        .iter()
        .map(|(id, source)| json!({"_index": index, "_id": id, "_score": 1.0, "_source": source}))
        .collect();
    Json(json!({
        "took": 1,
        "timed_out": false,
        "hits": {"total": {"value": hits.len(), "relation": "eq"}, "hits": hits},
    }))
    .into_response()
}

async fn count(State(db): State<Db>, Path(index): Path<String>) -> Response {
    match db.read().await.get(&index) {
        Some(docs) => Json(json!({"count": docs.len()})).into_response(),
        None => index_not_found(&index),
    }
}

async fn bulk(State(db): State<Db>, headers: HeaderMap, body: Bytes) -> Response {
    apply_bulk(&db, None, &headers, &body).await
}

async fn bulk_into(
    State(db): State<Db>,
    Path(index): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    apply_bulk(&db, Some(&index), &headers, &body).await
}

/// Supports `index` and `delete` actions.
async fn apply_bulk(db: &Db, default_index: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Response {
    let ndjson = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("x-ndjson"));
    if !ndjson {
        return error(
            StatusCode::NOT_ACCEPTABLE,
            "media_type_header_exception",
            "bulk requests must be newline-delimited JSON".to_string(),
        );
    }
    if !body.ends_with(b"\n") {
        return error(
            StatusCode::BAD_REQUEST,
            "illegal_argument_exception",
            "The bulk request must be terminated by a newline [\\n]".to_string(),
        );
    }
    let lines: Result<Vec<Value>, _> = body
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(serde_json::from_slice::<Value>)
        .collect();
    let Ok(lines) = lines else {
        return error(
            StatusCode::BAD_REQUEST,
            "x_content_parse_exception",
            "malformed bulk line".to_string(),
        );
    };

    let mut indices = db.write().await;
    let mut items = Vec::new();
    let mut errors = false;
    let mut lines = lines.into_iter();
    while let Some(action) = lines.next() {
        let (kind, meta) = match action.as_object().and_then(|o| o.iter().next()) {
            Some((kind, meta)) => (kind.clone(), meta.clone()),
            None => {
                errors = true;
                continue;
            }
        };
        let index = meta["_index"]
            .as_str()
            .or(default_index)
            .unwrap_or_default()
            .to_string();
        let id = meta["_id"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let docs = indices.entry(index.clone()).or_default();
        let item = match kind.as_str() {
            "index" | "create" => {
                let source = lines.next().unwrap_or(Value::Null);
                let created = docs.insert(id.clone(), source).is_none();
                json!({"_index": index, "_id": id, "status": if created { 201 } else { 200 },
                       "result": if created { "created" } else { "updated" }})
            }
            "delete" => {
                let found = docs.remove(&id).is_some();
                json!({"_index": index, "_id": id, "status": if found { 200 } else { 404 },
                       "result": if found { "deleted" } else { "not_found" }})
            }
            other => {
                errors = true;
                json!({"_index": index, "_id": id, "status": 400, "error": format!("unsupported action [{other}]")})
            }
        };
        items.push(json!({ kind: item }));
    }
    Json(json!({"took": 1, "errors": errors, "items": items})).into_response()
}

#[derive(Deserialize)]
struct CatParams {
    format: Option<String>,
}

async fn cat_aliases(Query(params): Query<CatParams>, headers: HeaderMap) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if params.format.as_deref() == Some("json") {
        return Json(json!([{"alias": "logs", "index": "logs-000001"}])).into_response();
    }
    if !accept.contains("text/plain") {
        return error(
            StatusCode::NOT_ACCEPTABLE,
            "media_type_header_exception",
            format!("unsupported Accept [{accept}]"),
        );
    }
    (
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        "logs logs-000001 - - - -\n",
    )
        .into_response()
}

async fn cluster_health(State(db): State<Db>) -> Json<Value> {
    let indices = db.read().await.len();
    Json(json!({"cluster_name": "mock-cluster", "status": "green", "number_of_nodes": 1, "indices": indices}))
}

/// Reflects the request back for wire-level assertions.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn boom() -> Response {
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "mock_exception",
        "boom".to_string(),
    )
}

async fn large() -> Response {
    let body = format!("{{\"padding\":\"{}\"}}", "x".repeat(LARGE_BODY_BYTES));
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn foreign() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>gateway</body></html>",
    )
        .into_response()
}
