//! Purpose: Shared fixtures for integration tests.
//! Exports: `RecordingTransport`, `FakeGraph`, `LinkServer`, `object`.
//! Role: Stub transport for request-shape tests; in-process axum graph for HTTP tests.
//! Invariants: Servers bind loopback port 0 and live as long as their handle.
#![allow(dead_code)]

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use graphkit::api::{Error, Method, Params, RequestPath, Transport, async_trait};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub method: Method,
    pub path: RequestPath,
    pub params: Params,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<Value, Error>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, value: Value) {
        self.responses.lock().expect("lock").push_back(Ok(value));
    }

    pub fn fail(&self, err: Error) {
        self.responses.lock().expect("lock").push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls().last().cloned().expect("at least one call")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn call(
        &self,
        method: Method,
        path: &RequestPath,
        params: &Params,
    ) -> Result<Value, Error> {
        self.calls.lock().expect("lock").push(RecordedCall {
            method,
            path: path.clone(),
            params: params.clone(),
        });
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .expect("no queued response")
    }
}

pub const VERSION: &str = "v1";
pub const TOKEN: &str = "secret";
const FRIENDS: usize = 5;

#[derive(Default)]
pub struct GraphState {
    base_url: String,
    pub writes: Mutex<Vec<(String, HashMap<String, String>)>>,
    pub deletes: Mutex<Vec<String>>,
}

/// Fake graph server exposing nodes, a `friends` edge, batch reads and writes.
pub struct FakeGraph {
    pub base_url: String,
    pub state: Arc<GraphState>,
}

impl FakeGraph {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let state = Arc::new(GraphState {
            base_url: base_url.clone(),
            ..GraphState::default()
        });
        let app = Router::new()
            .route("/v1", get(nodes_by_id))
            .route("/v1/:id", get(read_node).post(update_node).delete(delete_node))
            .route("/v1/:id/:edge", get(list_edge).post(create_node))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { base_url, state }
    }
}

/// Serves one edge page at every path and records each request's
/// `Authorization` header. The page links to `next`, when set.
pub struct LinkServer {
    pub base_url: String,
    pub seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl LinkServer {
    pub async fn start(next: Option<String>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().fallback(move |headers: HeaderMap| {
            let recorder = recorder.clone();
            let next = next.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                recorder.lock().expect("lock").push(auth);
                let paging = match next {
                    Some(next) => json!({"next": next}),
                    None => json!({}),
                };
                Json(json!({"data": [{"id": "linked"}], "paging": paging}))
            }
        });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { base_url, seen }
    }

    pub fn seen(&self) -> Vec<Option<String>> {
        self.seen.lock().expect("lock").clone()
    }
}

/// `FakeGraph` driven by its own runtime, for synchronous tests.
pub struct BackgroundGraph {
    pub graph: FakeGraph,
    _runtime: tokio::runtime::Runtime,
}

impl BackgroundGraph {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime");
        let graph = runtime.block_on(FakeGraph::start());
        Self {
            graph,
            _runtime: runtime,
        }
    }
}

fn graph_error(status: StatusCode, kind: &str, message: &str, code: i64) -> Response {
    let body = json!({
        "error": {"message": message, "type": kind, "code": code, "fbtrace_id": "trace-1"}
    });
    (status, Json(body)).into_response()
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("authorization").and_then(|value| value.to_str().ok()) {
        None => Ok(()),
        Some(value) if value == format!("Bearer {TOKEN}") => Ok(()),
        Some(_) => Err(graph_error(
            StatusCode::UNAUTHORIZED,
            "OAuthException",
            "Invalid OAuth access token",
            190,
        )),
    }
}

fn node_json(id: &str) -> Map<String, Value> {
    object(json!({"id": id, "name": format!("Node {id}"), "email": format!("{id}@example.test")}))
}

fn select_fields(
    mut data: Map<String, Value>,
    query: &HashMap<String, String>,
) -> Map<String, Value> {
    if let Some(fields) = query.get("fields") {
        let wanted: Vec<&str> = fields.split(',').collect();
        data.retain(|key, _| key == "id" || wanted.contains(&key.as_str()));
    }
    data
}

async fn read_node(
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = authorized(&headers) {
        return response;
    }
    if id == "missing" {
        return graph_error(
            StatusCode::NOT_FOUND,
            "GraphMethodException",
            "Unsupported get request",
            100,
        );
    }
    Json(Value::Object(select_fields(node_json(&id), &query))).into_response()
}

async fn nodes_by_id(Query(query): Query<HashMap<String, String>>) -> Response {
    let Some(ids) = query.get("ids") else {
        return graph_error(StatusCode::BAD_REQUEST, "OAuthException", "ids required", 100);
    };
    // Reverse order on purpose: callers must keep the response's order.
    let mut out = Map::new();
    for id in ids.split(',').rev() {
        out.insert(id.to_string(), Value::Object(select_fields(node_json(id), &query)));
    }
    Json(Value::Object(out)).into_response()
}

async fn list_edge(
    State(state): State<Arc<GraphState>>,
    Path((id, edge)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if edge != "friends" {
        return graph_error(StatusCode::BAD_REQUEST, "OAuthException", "unknown edge", 100);
    }
    let limit: usize = query
        .get("limit")
        .and_then(|value| value.parse().ok())
        .unwrap_or(2);
    let offset: usize = query
        .get("after")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    let end = (offset + limit).min(FRIENDS);
    let data: Vec<Value> = (offset..end)
        .map(|index| {
            let friend = format!("{id}-f{}", index + 1);
            Value::Object(select_fields(node_json(&friend), &query))
        })
        .collect();

    let mut carry = format!("limit={limit}");
    if let Some(fields) = query.get("fields") {
        carry.push_str(&format!("&fields={fields}"));
    }
    let mut paging = Map::new();
    if end < FRIENDS {
        paging.insert(
            "next".to_string(),
            json!(format!("{}/v1/{id}/friends?{carry}&after={end}", state.base_url)),
        );
    }
    if offset > 0 {
        let previous = offset.saturating_sub(limit);
        paging.insert(
            "previous".to_string(),
            json!(format!("{}/v1/{id}/friends?{carry}&after={previous}", state.base_url)),
        );
    }
    Json(json!({
        "data": data,
        "paging": paging,
        "summary": {"total_count": FRIENDS}
    }))
    .into_response()
}

async fn update_node(
    State(state): State<Arc<GraphState>>,
    Path(id): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.writes.lock().expect("lock").push((id, form));
    Json(json!({"success": true})).into_response()
}

async fn create_node(
    State(state): State<Arc<GraphState>>,
    Path((id, edge)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state
        .writes
        .lock()
        .expect("lock")
        .push((format!("{id}/{edge}"), form));
    Json(json!({"id": "new-1"})).into_response()
}

async fn delete_node(State(state): State<Arc<GraphState>>, Path(id): Path<String>) -> Response {
    state.deletes.lock().expect("lock").push(id);
    Json(json!(true)).into_response()
}
