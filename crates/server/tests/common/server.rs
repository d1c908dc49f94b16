//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use satchel_core::AppConfig;
use satchel_server::{AppState, create_router};
use satchel_store::Store;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server backed by a temporary database.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = AppConfig::for_testing();
        config.database_path = temp_dir.path().join("satchel.db");
        modifier(&mut config);

        let store = satchel_store::open(&config.database_path)
            .await
            .expect("Failed to open store");

        let state = AppState::new(config, store).expect("Failed to create state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying store.
    pub fn store(&self) -> Arc<dyn Store> {
        self.state.store.clone()
    }
}

/// Make a JSON request against the router and decode the response.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Register a protocol-004 user through the API and return the full
/// authentication response (user + session tokens).
#[allow(dead_code)]
pub async fn register_user(server: &TestServer, email: &str, password: &str) -> Value {
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/auth",
        Some(json!({
            "api": "20200115",
            "email": email,
            "password": password,
            "pw_nonce": "test-nonce",
            "version": "004",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "registration failed: {body}");
    body
}

/// Extract the wrapped access token from an authentication response.
#[allow(dead_code)]
pub fn access_token(auth_response: &Value) -> String {
    auth_response["session"]["access_token"]
        .as_str()
        .expect("authentication response carries a session")
        .to_string()
}

/// Extract the wrapped refresh token from an authentication response.
#[allow(dead_code)]
pub fn refresh_token(auth_response: &Value) -> String {
    auth_response["session"]["refresh_token"]
        .as_str()
        .expect("authentication response carries a session")
        .to_string()
}
