//! HTTP server assembly
//!
//! Builds the axum router over `AppState` and serves it until the shutdown
//! future resolves.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use shared::{logging, ProcessId};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{WebServerError, WebServerResult};
use crate::state::AppState;
use crate::web::handlers::{analyze_cv, health, method_not_allowed, preflight};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct WebServer {
    state: AppState,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .route(
                "/api/analyze-python",
                post(analyze_cv).options(preflight).fallback(method_not_allowed),
            )
            .route("/api/health", get(health))
            .layer(
                ServiceBuilder::new()
                    .layer(cors)
                    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
            )
            .with_state(self.state.clone())
    }

    /// Serve on `addr` until `shutdown` completes
    pub async fn run<F>(&self, addr: SocketAddr, shutdown: F) -> WebServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await.map_err(|err| WebServerError::ServerStartup {
            addr: addr.to_string(),
            message: err.to_string(),
        })?;

        logging::log_startup(
            ProcessId::current(),
            &format!(
                "HTTP server listening on http://{} (python processing {})",
                addr,
                if self.state.config.enable_python_processing { "enabled" } else { "disabled" }
            ),
        );

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
