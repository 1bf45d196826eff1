//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the gate in front of every handler,
//!   `/health` included
//! - Wire up middleware (tracing, request ID, timeout)
//! - Bind server to listener and shut down gracefully
//! - Run the rate limiter sweeper for the server's lifetime

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{Method, Uri},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::middleware::{gate_middleware, GateState, RequestContext};
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::Shutdown;
use crate::pipeline::RequestPipeline;

/// Liveness endpoint served by the built-in handler set.
pub const HEALTH_PATH: &str = "/health";

/// HTTP server for the request gate.
pub struct GateServer {
    router: Router,
    pipeline: Arc<RequestPipeline>,
    sweep_interval: Duration,
}

impl GateServer {
    pub fn new(config: &GateConfig, pipeline: RequestPipeline) -> Self {
        let pipeline = Arc::new(pipeline);
        let router = Self::build_router(config, pipeline.clone());
        Self {
            router,
            pipeline,
            sweep_interval: Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1)),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &GateConfig, pipeline: Arc<RequestPipeline>) -> Router {
        let state = GateState {
            pipeline,
            max_body_size: config.security.max_body_size,
            trust_forwarded_for: config.security.trust_forwarded_for,
        };

        // `/health` is gated like everything else; it needs a `public` route entry.
        Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .fallback(echo_handler)
            .layer(middleware::from_fn_with_state(state, gate_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` is triggered, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let signalled = shutdown.signalled();
        let sweeper = self
            .pipeline
            .rate_limiter()
            .clone()
            .spawn_sweeper(self.sweep_interval, shutdown.subscribe());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(signalled)
            .await?;

        shutdown.trigger();
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Rate limit sweeper ended abnormally");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Stand-in for the protected application: reports what the gate admitted.
async fn echo_handler(
    method: Method,
    uri: Uri,
    Extension(context): Extension<RequestContext>,
) -> impl IntoResponse {
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "request_id": context.request_id,
        "origin_allowed": context.origin_allowed,
        "identity": context.identity,
    }))
}
