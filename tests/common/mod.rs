//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use control_gateway::config::ControlConfig;
use control_gateway::lifecycle::{Collaborators, Gateway, Shutdown, StartupError};
use control_gateway::tls::MaterialStore;

/// One request seen by the mock secrets backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub token: Option<String>,
    pub body: Value,
}

/// Programmable state behind the mock secrets backend.
#[derive(Default)]
pub struct VaultState {
    /// Stored documents by path (without the `v1/` prefix).
    pub secrets: Mutex<HashMap<String, Value>>,
    /// Auth block returned from any `*/login` call; `None` answers with no auth.
    pub login: Mutex<Option<Value>>,
    /// Data returned from `*/issue/*` calls.
    pub issue: Mutex<Option<Value>>,
    /// Number of upcoming reads that fail with a 500.
    pub fail_reads: AtomicU32,
    pub requests: Mutex<Vec<Recorded>>,
}

impl VaultState {
    pub fn put(&self, path: &str, document: Value) {
        self.secrets.lock().unwrap().insert(path.to_string(), document);
    }

    pub fn requests_to(&self, suffix: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path.ends_with(suffix))
            .cloned()
            .collect()
    }
}

async fn handle(
    State(state): State<Arc<VaultState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/v1/").to_string();
    let token = headers
        .get("x-vault-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    state.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        token: token.clone(),
        body: body.clone(),
    });

    if path.ends_with("/login") {
        let auth = state.login.lock().unwrap().clone();
        return Json(json!({ "auth": auth })).into_response();
    }

    if path == "auth/token/renew-self" {
        return Json(json!({
            "auth": {
                "client_token": token.unwrap_or_default(),
                "accessor": "accessor-renewed",
                "lease_duration": 3600,
                "renewable": true,
            }
        }))
        .into_response();
    }

    if method == Method::GET {
        let pending = state.fail_reads.load(Ordering::SeqCst);
        if pending > 0 {
            state.fail_reads.store(pending - 1, Ordering::SeqCst);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "errors": ["backend sealed"] })),
            )
                .into_response();
        }
        return match state.secrets.lock().unwrap().get(&path) {
            Some(document) => Json(json!({ "data": document })).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    if path.contains("/issue/") {
        return match state.issue.lock().unwrap().clone() {
            Some(issued) => Json(json!({ "data": issued })).into_response(),
            None => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": ["issuance disabled"] })),
            )
                .into_response(),
        };
    }

    state.put(&path, body);
    StatusCode::NO_CONTENT.into_response()
}

/// Start the mock secrets backend on an ephemeral port.
pub async fn start_mock_vault() -> (SocketAddr, Arc<VaultState>) {
    let state = Arc::new(VaultState::default());
    let app = Router::new().fallback(handle).with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, state)
}

/// A complete configuration pointing at `vault`, serving on an ephemeral loopback port.
pub fn test_config(vault: SocketAddr, identity: &Path) -> ControlConfig {
    let mut config = ControlConfig::default();
    config.deployment.database_url = "postgres://control@localhost/control".into();
    config.deployment.s3_bucket = "control-artifacts".into();
    config.deployment.domain = "*.hub.example.test".into();
    config.deployment.register_token = "register-secret".into();
    config.deployment.ops_token = "ops-secret".into();
    config.deployment.image_tag = Some("v1.2.3".into());
    config.deployment.use_tls_manager = false;

    config.vault.address = format!("http://{}", vault);
    config.vault.identity_token_path = identity.display().to_string();

    config.listener.bind_host = "127.0.0.1".into();
    config.listener.port = 0;
    config.listener.shutdown_grace_secs = 1;
    config.health.enabled = false;
    config
}

/// A gateway serving in the background.
pub struct Running {
    pub address: SocketAddr,
    pub store: Arc<MaterialStore>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), StartupError>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("https://127.0.0.1:{}{}", self.address.port(), path)
    }

    /// Trigger shutdown and wait for `serve` to return.
    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("gateway did not stop in time")
            .expect("gateway task panicked")
    }
}

pub async fn start_gateway(config: ControlConfig, collaborators: Collaborators) -> Running {
    let shutdown = Shutdown::new();
    let gateway = Gateway::prepare(config, collaborators, &shutdown)
        .await
        .expect("gateway prepares");
    let store = gateway.store().clone();
    let handle = gateway.handle();
    let task = tokio::spawn(gateway.serve());
    let address = handle.listening().await.expect("listener bound");

    Running {
        address,
        store,
        shutdown,
        task,
    }
}

/// HTTPS client that accepts the gateway's certificate and exposes it via `TlsInfo`.
pub fn tls_client(http2: bool) -> reqwest::Client {
    let builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .tls_info(true)
        .timeout(Duration::from_secs(5));
    let builder = if http2 {
        builder.http2_prior_knowledge()
    } else {
        builder.http1_only()
    };
    builder.build().unwrap()
}

/// DER of the leaf certificate the server presented.
pub fn peer_certificate(response: &reqwest::Response) -> Vec<u8> {
    response
        .extensions()
        .get::<reqwest::tls::TlsInfo>()
        .and_then(|info| info.peer_certificate())
        .expect("peer certificate recorded")
        .to_vec()
}

/// Poll `check` until it holds or `deadline` passes.
pub async fn eventually<F, Fut>(deadline: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
