//! Gate responses.
//!
//! # Responsibilities
//! - Render denials as `{"error": <reason>, "status": <code>}`
//! - Attach `Retry-After` and CORS headers
//! - Answer CORS preflights
//!
//! # Design Decisions
//! - Denials echo an allowed origin so browsers can read the error body
//! - No internal detail leaks past the reason code

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::{DenyReason, PipelineVerdict};
use crate::security::{retry_after_secs, OriginPolicy};

#[derive(Debug, Serialize)]
pub struct DenialBody {
    pub error: &'static str,
    pub status: u16,
}

/// JSON error body with the reason's status code.
pub fn denial(reason: DenyReason) -> Response {
    let status = reason.status();
    let body = DenialBody {
        error: reason.code(),
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

/// Response for any verdict that does not reach the handler.
pub fn terminal_response(verdict: &PipelineVerdict, origins: &OriginPolicy) -> Response {
    let mut response = match verdict.reason {
        Some(reason) => denial(reason),
        None => StatusCode::NO_CONTENT.into_response(),
    };

    let cors = if verdict.is_preflight() {
        origins.preflight_headers(&verdict.origin_decision)
    } else {
        origins.response_headers(&verdict.origin_decision)
    };
    extend_headers(response.headers_mut(), cors);

    if let Some(retry_after) = verdict.retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
    }
    response
}

/// Copy headers, appending to `Vary` instead of replacing it.
pub fn extend_headers(target: &mut HeaderMap, source: HeaderMap) {
    for (name, value) in source.iter() {
        if name == header::VARY {
            target.append(name, value.clone());
        } else {
            target.insert(name, value.clone());
        }
    }
}
