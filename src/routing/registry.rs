//! Endpoint policy lookup.
//!
//! # Responsibilities
//! - Store compiled endpoint policies
//! - Look up the policy for a request path and method
//! - Answer email allowlist queries for `allowlist-email` routes
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) exact lookup via HashMap, exact entries beat wildcards
//! - Wildcards sorted longest-first; first match wins
//! - Explicit UnknownRoute rather than silent default

use std::collections::HashMap;

use axum::http::Method;
use thiserror::Error;

use crate::config::RouteConfig;
use crate::routing::allowlist::EmailAllowlist;
use crate::routing::matcher::PathPattern;
use crate::routing::policy::EndpointPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no endpoint policy matches the path")]
    UnknownRoute,
    #[error("method not allowed on this endpoint")]
    MethodNotAllowed,
}

/// Route → policy table plus the sign-in email allowlist.
#[derive(Debug, Default)]
pub struct EndpointPolicyRegistry {
    exact: HashMap<String, EndpointPolicy>,
    wildcards: Vec<EndpointPolicy>,
    emails: EmailAllowlist,
}

impl EndpointPolicyRegistry {
    /// Compile routes and allowlist entries. Entries that fail to compile are
    /// skipped with an error log; `validate_config` rejects them beforehand.
    pub fn from_config(routes: &[RouteConfig], email_allowlist: &[String]) -> Self {
        let mut registry = Self {
            emails: EmailAllowlist::from_entries(email_allowlist),
            ..Self::default()
        };

        for route in routes {
            match EndpointPolicy::from_config(route) {
                Some(policy) => registry.insert(policy),
                None => tracing::error!(path = %route.path, "Skipping invalid route policy"),
            }
        }

        registry
            .wildcards
            .sort_by(|a, b| b.path_pattern.specificity().cmp(&a.path_pattern.specificity()));

        tracing::debug!(
            exact = registry.exact.len(),
            wildcards = registry.wildcards.len(),
            "Endpoint policy registry compiled"
        );
        registry
    }

    fn insert(&mut self, policy: EndpointPolicy) {
        match &policy.path_pattern {
            PathPattern::Exact(path) => {
                self.exact.insert(path.clone(), policy);
            }
            PathPattern::Prefix(_) => self.wildcards.push(policy),
        }
    }

    /// Find the most specific policy for the path and check the method.
    pub fn lookup(&self, path: &str, method: &Method) -> Result<&EndpointPolicy, LookupError> {
        let policy = self
            .exact
            .get(path)
            .or_else(|| self.wildcards.iter().find(|p| p.path_pattern.matches(path)))
            .ok_or(LookupError::UnknownRoute)?;

        if policy.allows_method(method) {
            Ok(policy)
        } else {
            Err(LookupError::MethodNotAllowed)
        }
    }

    pub fn is_email_allowed(&self, email: &str) -> bool {
        self.emails.is_allowed(email)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteMode;
    use crate::routing::policy::AuthMode;

    fn route(path: &str, mode: RouteMode, methods: &[&str]) -> RouteConfig {
        RouteConfig {
            path: path.into(),
            mode,
            methods: methods.iter().map(|m| m.to_string()).collect(),
            signature_provider: None,
            rate_limit: None,
        }
    }

    fn registry() -> EndpointPolicyRegistry {
        EndpointPolicyRegistry::from_config(
            &[
                route("/*", RouteMode::Public, &[]),
                route("/api/*", RouteMode::TokenRequired, &[]),
                route("/api/public/*", RouteMode::Public, &["GET"]),
                route("/api/public/login", RouteMode::AllowlistEmail, &["POST"]),
            ],
            &["@company.com".to_string()],
        )
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let reg = registry();
        let policy = reg.lookup("/api/public/login", &Method::POST).unwrap();
        assert_eq!(policy.mode, AuthMode::AllowlistEmail);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let reg = registry();
        assert_eq!(
            reg.lookup("/api/public/docs", &Method::GET).unwrap().mode,
            AuthMode::Public
        );
        assert_eq!(
            reg.lookup("/api/data", &Method::GET).unwrap().mode,
            AuthMode::TokenRequired
        );
        assert_eq!(
            reg.lookup("/index.html", &Method::GET).unwrap().mode,
            AuthMode::Public
        );
    }

    #[test]
    fn test_method_not_allowed() {
        let reg = registry();
        assert_eq!(
            reg.lookup("/api/public/login", &Method::GET).unwrap_err(),
            LookupError::MethodNotAllowed
        );
    }

    #[test]
    fn test_unknown_route() {
        let reg = EndpointPolicyRegistry::from_config(
            &[route("/api/data", RouteMode::TokenRequired, &[])],
            &[],
        );
        assert_eq!(
            reg.lookup("/other", &Method::GET).unwrap_err(),
            LookupError::UnknownRoute
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_email_allowlist() {
        let reg = registry();
        assert!(reg.is_email_allowed("alice@company.com"));
        assert!(!reg.is_email_allowed("alice@other.com"));
    }
}
