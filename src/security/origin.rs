//! Cross-origin policy.
//!
//! # Responsibilities
//! - Decide whether a browser cross-origin request is permitted
//! - Answer CORS preflight requests
//! - Build the CORS response headers for allowed origins
//!
//! # Design Decisions
//! - Evaluation is pure; the allowlist is frozen at construction
//! - Only allowlisted origins are ever echoed back
//! - A missing Origin header is not hostile (same-origin or non-browser caller)

use std::collections::HashSet;

use axum::http::{
    header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, VARY,
    },
    HeaderMap, HeaderValue, Method,
};

use crate::config::{CorsConfig, DeploymentMode};

/// Outcome of the origin check for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OriginDecision {
    pub allowed: bool,
    /// Allowlisted origin to put in `Access-Control-Allow-Origin`.
    pub echoed_origin: Option<String>,
    /// The request was an `OPTIONS` preflight.
    pub preflight: bool,
}

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowlist: HashSet<String>,
    allow_methods: String,
    allow_headers: String,
    max_age_secs: u64,
    allow_credentials: bool,
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

impl OriginPolicy {
    pub fn new(config: &CorsConfig, deployment: DeploymentMode) -> Self {
        let mut allowlist: HashSet<String> =
            config.allowed_origins.iter().map(|o| normalize(o)).collect();

        if config.allow_localhost {
            if deployment.is_production() {
                tracing::error!("Ignoring cors.allow_localhost in production deployment");
            } else {
                tracing::warn!(
                    origin = %config.localhost_origin,
                    deployment = ?deployment,
                    "Development origin appended to CORS allowlist"
                );
                allowlist.insert(normalize(&config.localhost_origin));
            }
        }

        Self {
            allowlist,
            allow_methods: config.allowed_methods.join(", "),
            allow_headers: config.allowed_headers.join(", "),
            max_age_secs: config.max_age_secs,
            allow_credentials: config.allow_credentials,
        }
    }

    pub fn is_allowlisted(&self, origin: &str) -> bool {
        self.allowlist.contains(&normalize(origin))
    }

    pub fn evaluate(&self, method: &Method, origin: Option<&str>) -> OriginDecision {
        let preflight = method == Method::OPTIONS;
        let echoed_origin = origin
            .map(normalize)
            .filter(|o| self.allowlist.contains(o));

        let allowed = match origin {
            Some(_) => echoed_origin.is_some(),
            // Preflights without an Origin are not from a browser; nothing to grant.
            None => !preflight,
        };

        OriginDecision {
            allowed,
            echoed_origin,
            preflight,
        }
    }

    /// Headers for an admitted preflight. Empty unless the origin was allowlisted.
    pub fn preflight_headers(&self, decision: &OriginDecision) -> HeaderMap {
        let mut headers = self.response_headers(decision);
        if headers.is_empty() {
            return headers;
        }
        if let Ok(v) = HeaderValue::from_str(&self.allow_methods) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.allow_headers) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, v);
        }
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age_secs));
        headers
    }

    /// Headers attached to admitted cross-origin responses.
    pub fn response_headers(&self, decision: &OriginDecision) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let origin = match (&decision.echoed_origin, decision.allowed) {
            (Some(origin), true) => origin,
            _ => return headers,
        };
        let Ok(value) = HeaderValue::from_str(origin) else {
            return headers;
        };
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(VARY, HeaderValue::from_static("Origin"));
        if self.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers
    }
}
