//! In-process mock of the ksqlDB REST API
//!
//! Query responses are scripted by a substring of the submitted SQL. Every
//! request body is recorded so tests can assert on what the client sent.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Script {
    needle: String,
    status: u16,
    lines: Vec<String>,
    hold_open: bool,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: Mutex<Vec<Script>>,
    queries: Mutex<Vec<(String, Value)>>,
    statements: Mutex<Vec<Value>>,
    close_requests: Mutex<Vec<String>>,
    authorization: Mutex<Vec<String>>,
    accept: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockKsqlDb {
    state: Arc<MockState>,
}

impl MockKsqlDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to queries containing `needle` with `lines`, then end the body.
    pub fn script(&self, needle: &str, lines: &[&str]) -> &Self {
        self.push(needle, 200, lines, false)
    }

    /// Respond with `lines` and keep the body open until the client leaves.
    pub fn script_open(&self, needle: &str, lines: &[&str]) -> &Self {
        self.push(needle, 200, lines, true)
    }

    pub fn script_status(&self, needle: &str, status: u16, body: &str) -> &Self {
        self.push(needle, status, &[body], false)
    }

    fn push(&self, needle: &str, status: u16, lines: &[&str], hold_open: bool) -> &Self {
        self.state.scripts.lock().unwrap().push(Script {
            needle: needle.to_string(),
            status,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            hold_open,
        });
        self
    }

    /// `(path, body)` of every query request.
    pub fn queries(&self) -> Vec<(String, Value)> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<Value> {
        self.state.statements.lock().unwrap().clone()
    }

    pub fn close_requests(&self) -> Vec<String> {
        self.state.close_requests.lock().unwrap().clone()
    }

    pub fn authorization(&self) -> Vec<String> {
        self.state.authorization.lock().unwrap().clone()
    }

    /// `Accept` header of every query request.
    pub fn accept(&self) -> Vec<String> {
        self.state.accept.lock().unwrap().clone()
    }

    fn find(&self, sql: &str) -> Option<Script> {
        self.state
            .scripts
            .lock()
            .unwrap()
            .iter()
            .find(|s| sql.contains(&s.needle))
            .cloned()
    }

    fn record_auth(&self, headers: &HeaderMap) {
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.state
                .authorization
                .lock()
                .unwrap()
                .push(value.to_string());
        }
    }
}

/// Start the mock on an ephemeral port and return its base URL.
pub async fn start(mock: MockKsqlDb) -> String {
    let app = Router::new()
        .route("/query-stream", post(query_stream))
        .route("/query", post(query))
        .route("/close-query", post(close_query))
        .route("/ksql", post(ksql))
        .route("/info", get(info))
        .route("/healthcheck", get(healthcheck))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Poll `condition` until it holds or two seconds have passed.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

// ============================================================================
// Handlers
// ============================================================================

async fn query_stream(State(mock): State<MockKsqlDb>, headers: HeaderMap, body: Bytes) -> Response {
    scripted(&mock, "/query-stream", "sql", &headers, &body)
}

async fn query(State(mock): State<MockKsqlDb>, headers: HeaderMap, body: Bytes) -> Response {
    scripted(&mock, "/query", "ksql", &headers, &body)
}

fn scripted(mock: &MockKsqlDb, path: &str, key: &str, headers: &HeaderMap, body: &[u8]) -> Response {
    mock.record_auth(headers);
    if let Some(accept) = headers.get("accept").and_then(|v| v.to_str().ok()) {
        mock.state.accept.lock().unwrap().push(accept.to_string());
    }
    let body: Value = match serde_json::from_slice(body) {
        Ok(body) => body,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let sql = body[key].as_str().unwrap_or_default().to_string();
    mock.state
        .queries
        .lock()
        .unwrap()
        .push((path.to_string(), body));

    let Some(script) = mock.find(&sql) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "@type": "statement_error",
                "error_code": 40001,
                "message": format!("no script for {}", sql),
                "statementText": sql
            })),
        )
            .into_response();
    };

    let status = StatusCode::from_u16(script.status).unwrap();
    if !status.is_success() {
        return (status, script.lines.join("\n")).into_response();
    }

    let lines = stream::iter(
        script
            .lines
            .into_iter()
            .map(|l| Ok::<_, std::io::Error>(format!("{}\n", l))),
    );
    let body: BoxStream<'static, Result<String, std::io::Error>> = if script.hold_open {
        lines.chain(stream::pending()).boxed()
    } else {
        lines.boxed()
    };

    Response::builder()
        .status(StatusCode::OK)
        .body(Body::from_stream(body))
        .unwrap()
}

async fn close_query(State(mock): State<MockKsqlDb>, body: Bytes) -> StatusCode {
    let body: Value = serde_json::from_slice(&body).unwrap_or_default();
    if let Some(id) = body["queryId"].as_str() {
        mock.state
            .close_requests
            .lock()
            .unwrap()
            .push(id.to_string());
    }
    StatusCode::OK
}

async fn ksql(State(mock): State<MockKsqlDb>, headers: HeaderMap, body: Bytes) -> Response {
    mock.record_auth(&headers);
    let body: Value = serde_json::from_slice(&body).unwrap_or_default();
    let text = body["ksql"].as_str().unwrap_or_default().to_string();
    mock.state.statements.lock().unwrap().push(body);

    if text.contains("Missing") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "@type": "statement_error",
                "error_code": 40001,
                "message": "Source Missing does not exist.",
                "statementText": text,
                "entities": []
            })),
        )
            .into_response();
    }

    let status = if text.contains("Failing") { "ERROR" } else { "SUCCESS" };
    let message = if text.contains("Failing") {
        "Could not write the statement into the command topic."
    } else {
        "Statement written to command topic"
    };

    Json(json!([{
        "@type": "currentStatus",
        "statementText": text,
        "commandId": "stream/`X`/create",
        "commandStatus": {
            "status": status,
            "message": message,
            "queryId": null
        },
        "commandSequenceNumber": 2,
        "warnings": []
    }]))
    .into_response()
}

async fn info() -> Json<Value> {
    Json(json!({
        "KsqlServerInfo": {
            "version": "0.29.0",
            "kafkaClusterId": "cluster-1",
            "ksqlServiceId": "default_",
            "serverStatus": "RUNNING"
        }
    }))
}

async fn healthcheck() -> Json<Value> {
    Json(json!({
        "isHealthy": true,
        "details": {
            "metastore": {"isHealthy": true},
            "kafka": {"isHealthy": true}
        }
    }))
}
