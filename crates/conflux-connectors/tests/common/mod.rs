//! Fake InfluxDB 1.x HTTP server for handler tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use conflux_common::ConnectionConfig;

/// A query as received by the fake server
#[derive(Debug, Clone)]
pub struct ReceivedQuery {
    pub q: String,
    pub db: Option<String>,
    pub authorized: bool,
}

#[derive(Default)]
pub struct FakeState {
    pings: AtomicUsize,
    received: Mutex<Vec<ReceivedQuery>>,
    responses: Mutex<HashMap<String, (StatusCode, Value)>>,
}

impl FakeState {
    /// Number of `/ping` calls, i.e. connections opened
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<ReceivedQuery> {
        self.received.lock().unwrap().clone()
    }

    pub fn respond(&self, q: &str, status: StatusCode, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(q.to_string(), (status, body));
    }
}

pub struct FakeInflux {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
}

impl FakeInflux {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());

        let app = Router::new()
            .route("/ping", get(ping))
            .route("/query", post(query))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.addr.ip().to_string()).with_port(self.addr.port())
    }
}

async fn ping(State(state): State<Arc<FakeState>>) -> StatusCode {
    state.pings.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn query(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let q = params.get("q").cloned().unwrap_or_default();
    state.received.lock().unwrap().push(ReceivedQuery {
        q: q.clone(),
        db: params.get("db").cloned(),
        authorized: headers.contains_key(AUTHORIZATION),
    });

    let canned = state.responses.lock().unwrap().get(&q).cloned();
    match canned {
        Some((status, body)) => (status, Json(body)),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("error parsing query: unexpected {}", q)})),
        ),
    }
}

/// An address nothing listens on
pub fn unreachable_config() -> ConnectionConfig {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ConnectionConfig::new("127.0.0.1").with_port(port)
}

/// A single-series `/query` body
pub fn series(name: &str, columns: &[&str], values: Value) -> Value {
    json!({"results": [{"statement_id": 0, "series": [{
        "name": name,
        "columns": columns,
        "values": values,
    }]}]})
}

pub fn empty_result() -> Value {
    json!({"results": [{"statement_id": 0}]})
}
