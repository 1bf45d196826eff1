//! Gate middleware.
//! Runs every request through the pipeline before any handler sees it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::auth::Identity;
use crate::http::request::{client_ip, request_id};
use crate::http::response::{denial, extend_headers, terminal_response};
use crate::pipeline::{DenyReason, GateRequest, RequestPipeline};

/// Shared state for the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub pipeline: Arc<RequestPipeline>,
    pub max_body_size: usize,
    pub trust_forwarded_for: bool,
}

/// Context attached to admitted requests.
#[derive(Clone, Debug, Serialize)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub origin_allowed: bool,
    pub request_id: Option<String>,
}

pub async fn gate_middleware(
    State(state): State<GateState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let declared_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.max_body_size) {
        return denial(DenyReason::BodyTooLarge);
    }

    let ip = client_ip(&req, state.trust_forwarded_for);
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, path = %parts.uri.path(), "Request body rejected");
            return denial(DenyReason::BodyTooLarge);
        }
    };

    let gate_request = GateRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        headers: parts.headers.clone(),
        client_ip: ip,
        body: body.clone(),
        request_id: request_id(&parts.headers),
    };

    let verdict = state.pipeline.evaluate(&gate_request).await;
    let origins = state.pipeline.origins();
    if !verdict.admit {
        return terminal_response(&verdict, origins);
    }

    let cors = origins.response_headers(&verdict.origin_decision);
    let mut req = Request::from_parts(parts, Body::from(body));
    req.extensions_mut().insert(RequestContext {
        identity: verdict.identity,
        origin_allowed: verdict.origin_decision.allowed,
        request_id: gate_request.request_id,
    });

    let mut response = next.run(req).await.into_response();
    extend_headers(response.headers_mut(), cors);
    response
}
