//! Endpoint policy types.

use std::collections::HashSet;

use axum::http::Method;

use crate::config::{RouteConfig, RouteMode, RouteRateLimit};
use crate::routing::matcher::PathPattern;

/// Authorization required by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Public,
    TokenRequired,
    /// Verified by the named webhook signature provider instead of a token.
    SignatureRequired { provider: String },
    AllowlistEmail,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Public => "public",
            AuthMode::TokenRequired => "token-required",
            AuthMode::SignatureRequired { .. } => "signature-required",
            AuthMode::AllowlistEmail => "allowlist-email",
        }
    }
}

/// A compiled route policy. Read-only after startup.
#[derive(Debug, Clone)]
pub struct EndpointPolicy {
    pub path_pattern: PathPattern,
    pub mode: AuthMode,
    /// Empty means any method.
    pub allowed_methods: HashSet<Method>,
    pub rate_limit: Option<RouteRateLimit>,
}

impl EndpointPolicy {
    /// Compile a config entry. Returns `None` for patterns or methods that
    /// validation would have rejected.
    pub fn from_config(route: &RouteConfig) -> Option<Self> {
        let path_pattern = PathPattern::parse(&route.path)?;
        let mode = match route.mode {
            RouteMode::Public => AuthMode::Public,
            RouteMode::TokenRequired => AuthMode::TokenRequired,
            RouteMode::AllowlistEmail => AuthMode::AllowlistEmail,
            RouteMode::SignatureRequired => AuthMode::SignatureRequired {
                provider: route.signature_provider.clone()?,
            },
        };
        let allowed_methods = route
            .methods
            .iter()
            .map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
            .collect::<Option<HashSet<_>>>()?;

        Some(Self {
            path_pattern,
            mode,
            allowed_methods,
            rate_limit: route.rate_limit,
        })
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.is_empty() || self.allowed_methods.contains(method)
    }
}
