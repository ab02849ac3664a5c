//! Common test utilities for server integration tests
//!
//! Writes a configuration and key files into a temporary directory, builds
//! the service from it and drives the router in-process.

#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use jwt_service_server::{AppState, ServiceConfig, build_state, router};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

pub const APP_ID: &str = "test-app";

/// Configuration with two ES256 keys and one earn and one spend offer
pub const DEFAULT_CONFIG: &str = r#"
app_id = "test-app"

[private_keys.es256_1]
algorithm = "ES256"
file = "keys/es256-1.pem"

[private_keys.es256_2]
algorithm = "ES256"
file = "keys/es256-2.pem"

[public_keys]
es256_1 = "keys/es256-1.pub.pem"
es256_2 = "keys/es256-2.pub.pem"

[[offers]]
id = "earn-1"
type = "earn"
amount = 20
title = "Daily survey"
description = "Answer three quick questions"

[[offers]]
id = "spend-1"
type = "spend"
amount = 50
title = "Sticker pack"
description = "Five exclusive stickers"
"#;

/// Current time as Unix timestamp
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../jwt-service-auth/tests/fixtures")
}

/// Temporary directory holding `service.toml` and a `keys/` directory
pub fn config_dir(contents: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let keys = dir.path().join("keys");
    std::fs::create_dir(&keys).unwrap();

    for name in ["es256-1.pem", "es256-1.pub.pem", "es256-2.pem", "es256-2.pub.pem"] {
        std::fs::copy(fixtures().join(name), keys.join(name)).unwrap();
    }

    std::fs::write(dir.path().join("service.toml"), contents).unwrap();
    dir
}

/// Load `service.toml` from a directory made by [`config_dir`]
pub fn load_config(dir: &TempDir) -> ServiceConfig {
    ServiceConfig::from_file(dir.path().join("service.toml")).unwrap()
}

/// In-process service
pub struct TestService {
    _dir: TempDir,
    pub state: Arc<AppState>,
    pub app: Router,
}

impl TestService {
    /// Service built from [`DEFAULT_CONFIG`]
    pub fn start() -> Self {
        Self::with_config(DEFAULT_CONFIG)
    }

    /// Service built from `contents`
    pub fn with_config(contents: &str) -> Self {
        let dir = config_dir(contents);
        let state = Arc::new(build_state(&load_config(&dir)).unwrap());
        let app = router(Arc::clone(&state));
        Self {
            _dir: dir,
            state,
            app,
        }
    }

    /// Send a GET request and return status and JSON body
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Send a POST request with a raw body and return status and JSON body
    pub async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    /// Issued token from a `{jwt}` response body
    pub fn jwt(body: &Value) -> &str {
        body["jwt"].as_str().expect("response carries a jwt")
    }
}
