//! Shared helpers for webserver integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pool::traits::{MockDirectRunner, MockProcessPool, MockRemoteProvider};
use pool::FallbackOrchestrator;
use serde_json::Value;
use shared::OptimizationResult;
use std::sync::Arc;
use tower::ServiceExt;
use webserver::traits::MockUsageLedger;
use webserver::{AppState, Config, WebServer};

pub const CV_TEXT: &str = "Jan Kowalski\nSenior Rust Developer\n10 lat doświadczenia w systemach rozproszonych";

pub struct Collaborators {
    pub pool: MockProcessPool,
    pub direct: MockDirectRunner,
    pub remote: MockRemoteProvider,
    pub ledger: Option<MockUsageLedger>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self {
            pool: MockProcessPool::new(),
            direct: MockDirectRunner::new(),
            remote: MockRemoteProvider::new(),
            ledger: None,
        }
    }

    pub fn router(self, config: Config) -> Router {
        let orchestrator =
            FallbackOrchestrator::new(Arc::new(self.pool), Arc::new(self.direct), Arc::new(self.remote));
        let mut state = AppState::new(config, orchestrator);
        if let Some(ledger) = self.ledger {
            state = state.with_ledger(Arc::new(ledger));
        }
        WebServer::new(state).build_router()
    }
}

pub fn python_enabled() -> Config {
    Config {
        enable_python_processing: true,
        ..Config::default()
    }
}

pub fn request_body(email: &str, plan: &str) -> Value {
    serde_json::json!({
        "currentCV": CV_TEXT,
        "email": email,
        "jobPosting": "Rust developer",
        "sessionId": "sess_123",
        "plan": plan,
    })
}

pub fn remote_result(html: &str) -> OptimizationResult {
    OptimizationResult {
        optimized_cv: html.into(),
        ats_score: Some(78.0),
        ..Default::default()
    }
}

pub fn analyze_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze-python")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn post_json(router: Router, body: Value) -> (StatusCode, Value) {
    send(router, analyze_request(body.to_string())).await
}
