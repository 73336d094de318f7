#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use respite::access::RoleTable;
use respite::auth::{generate_jwt, Claims, JwtAuthProvider};
use respite::config::AppConfig;
use respite::{catalog, router, AppState, AuthorizationGate, MemoryStore, PageBounds};

pub const SECRET: &str = "test-secret";

/// In-process app over a memory store, validating tokens signed with `SECRET`.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    /// Parsed JSON for `application/json` responses, otherwise `Null`.
    pub body: Value,
    pub text: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_roles(test_roles())
    }

    pub fn with_roles(roles: RoleTable) -> Self {
        Self::build(roles, None)
    }

    /// App that serves files from `dir` for unrouted paths.
    pub fn with_static_dir(dir: &Path) -> Self {
        Self::build(test_roles(), Some(dir.to_string_lossy().into_owned()))
    }

    fn build(roles: RoleTable, static_dir: Option<String>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(JwtAuthProvider::new(SECRET).expect("provider"));
        let registry = Arc::new(catalog::registry());
        let gate = AuthorizationGate::new(
            provider,
            store.clone(),
            registry,
            Arc::new(roles),
            PageBounds::new(2, 5),
        );

        let mut config = AppConfig::from_env().server;
        config.api_path = "api".to_string();
        config.min_page_size = 2;
        config.max_page_size = 5;
        config.static_dir = static_dir;

        let router = router(AppState::new(gate, store.clone()), &config);
        Self { store, router }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "localhost:8080");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("router failed")?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("application/json"));
        let body = if is_json {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        } else {
            Value::Null
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(TestResponse { status, headers, body, text })
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<TestResponse> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: &str) -> Result<TestResponse> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: &str) -> Result<TestResponse> {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<TestResponse> {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

pub fn test_roles() -> RoleTable {
    RoleTable::new()
        .with_role("Customer", ["order.read", "order.write", "product.read"])
        .with_role("Clerk", ["product.read", "product.write"])
        .with_role("Auditor", ["order.read", "order.global"])
        .with_role("Browser", ["order.read"])
}

/// Caller with a fresh subject id and the given roles.
pub struct Caller {
    pub id: Uuid,
    pub token: String,
}

impl Caller {
    pub fn new(username: &str, roles: &[&str]) -> Self {
        let id = Uuid::new_v4();
        let claims = Claims::new(id.to_string(), username, chrono::Duration::minutes(5))
            .with_roles(roles.iter().copied());
        let token = generate_jwt(&claims, SECRET).expect("token");
        Self { id, token }
    }
}
