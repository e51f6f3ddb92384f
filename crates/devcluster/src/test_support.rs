//! Fake node endpoints for tests.

use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use devcluster_common::{NodeDescriptor, PortScheme};

/// Descriptor for node `index` whose cluster port is `port`
pub fn node_on_port(index: usize, port: u16, dev_dir: &Path) -> NodeDescriptor {
    let mut node = NodeDescriptor::new(index, &PortScheme::default(), dev_dir);
    node.cluster_port = port;
    node
}

fn serve_router(listener: tokio::net::TcpListener, router: Router) {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
}

/// Health endpoint answering `GET /` with 200 on an ephemeral port
pub async fn serve_ok() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    serve_router(listener, health_router());
    port
}

/// Same as `serve_ok`, on a fixed port
pub async fn serve_ok_on(port: u16) {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    serve_router(listener, health_router());
}

fn health_router() -> Router {
    Router::new().route("/", get(|| async { r#"{"couchdb":"Welcome"}"# }))
}

/// A port that accepts TCP connections but never answers HTTP.
/// Keep the listener alive for as long as the port should stay silent.
pub fn silent_port() -> (std::net::TcpListener, u16) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Recorded membership request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCall {
    pub identity: String,
    pub authorization: Option<String>,
    pub body_len: usize,
}

#[derive(Clone, Default)]
struct CoordinatorState {
    calls: Arc<Mutex<Vec<JoinCall>>>,
    responses: Arc<HashMap<String, u16>>,
    default_status: u16,
}

/// Fake coordinator: records `PUT /_nodes/{identity}` calls and answers with
/// the status configured for that identity (or `default_status`).
pub struct FakeCoordinator {
    pub port: u16,
    calls: Arc<Mutex<Vec<JoinCall>>>,
}

impl FakeCoordinator {
    pub async fn start(default_status: u16, overrides: &[(&str, u16)]) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = CoordinatorState {
            calls: calls.clone(),
            responses: Arc::new(
                overrides
                    .iter()
                    .map(|(id, status)| (id.to_string(), *status))
                    .collect(),
            ),
            default_status,
        };

        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/_nodes/{identity}", put(record_join))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        serve_router(listener, router);
        Self { port, calls }
    }

    pub fn calls(&self) -> Vec<JoinCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn identities(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.identity).collect()
    }
}

async fn record_join(
    State(state): State<CoordinatorState>,
    UrlPath(identity): UrlPath<String>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> (StatusCode, &'static str) {
    state.calls.lock().unwrap().push(JoinCall {
        identity: identity.clone(),
        authorization: headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body_len: body.len(),
    });
    let status = state
        .responses
        .get(&identity)
        .copied()
        .unwrap_or(state.default_status);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if status.is_success() || status == StatusCode::CONFLICT {
        r#"{"ok":true}"#
    } else {
        r#"{"error":"internal_server_error","reason":"membership update failed"}"#
    };
    (status, body)
}
