//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing webhook providers)
//! - Validate value ranges (limits > 0, bounded fetch timeout)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GateConfig, RouteMode, WebhookKind};
use crate::routing::allowlist::EmailRule;
use crate::routing::matcher::PathPattern;

/// Upper bound on a single key-set fetch.
pub const MAX_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route table is empty")]
    NoRoutes,

    #[error("route `{0}` is registered more than once")]
    DuplicateRoute(String),

    #[error("route pattern `{0}` must start with `/` and may only end in `/*`")]
    InvalidPathPattern(String),

    #[error("route `{path}` lists invalid method `{method}`")]
    InvalidMethod { path: String, method: String },

    #[error("signature-required route `{0}` names no signature_provider")]
    MissingSignatureProvider(String),

    #[error("route `{path}` references unknown webhook provider `{provider}`")]
    UnknownSignatureProvider { path: String, provider: String },

    #[error("allowlist-email routes are configured but email_allowlist is empty")]
    MissingEmailAllowlist,

    #[error("invalid email_allowlist entry `{0}`")]
    InvalidEmailEntry(String),

    #[error("token-required routes are configured but neither token.jwks_url nor token.jwks_file is set")]
    MissingKeySource,

    #[error("token.jwks_url and token.jwks_file are mutually exclusive")]
    ConflictingKeySources,

    #[error("invalid token.jwks_url `{0}`")]
    InvalidJwksUrl(String),

    #[error("token.fetch_timeout_ms must be between 1 and {MAX_FETCH_TIMEOUT_MS}, got {0}")]
    InvalidFetchTimeout(u64),

    #[error("token.provider_retry.max_attempts must be at least 1")]
    InvalidRetryAttempts,

    #[error("cors.allow_localhost cannot be enabled in production")]
    LocalhostInProduction,

    #[error("invalid cors origin `{0}`")]
    InvalidOrigin(String),

    #[error("rate limit for `{0}` must have requests > 0 and window_ms > 0")]
    InvalidRateLimit(String),

    #[error("webhook provider `{0}` is defined more than once")]
    DuplicateWebhook(String),

    #[error("webhook provider `{0}` has an empty secret")]
    EmptyWebhookSecret(String),

    #[error("hmac-sha256 webhook provider `{0}` needs a header")]
    MissingWebhookHeader(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_routes(config, &mut errors);
    validate_token(config, &mut errors);
    validate_cors(config, &mut errors);
    validate_emails(config, &mut errors);
    validate_rate_limit(config, &mut errors);
    validate_webhooks(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let providers: HashSet<&str> = config.webhooks.iter().map(|w| w.name.as_str()).collect();
    let mut seen = HashSet::new();

    for route in &config.routes {
        if PathPattern::parse(&route.path).is_none() {
            errors.push(ValidationError::InvalidPathPattern(route.path.clone()));
        }
        if !seen.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.path.clone()));
        }
        for method in &route.methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    path: route.path.clone(),
                    method: method.clone(),
                });
            }
        }
        if route.mode == RouteMode::SignatureRequired {
            match &route.signature_provider {
                None => errors.push(ValidationError::MissingSignatureProvider(route.path.clone())),
                Some(provider) if !providers.contains(provider.as_str()) => {
                    errors.push(ValidationError::UnknownSignatureProvider {
                        path: route.path.clone(),
                        provider: provider.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        if let Some(limit) = route.rate_limit {
            if limit.requests == 0 || limit.window_ms == 0 {
                errors.push(ValidationError::InvalidRateLimit(route.path.clone()));
            }
        }
    }
}

fn validate_token(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let token = &config.token;
    let needs_keys = config
        .routes
        .iter()
        .any(|r| r.mode == RouteMode::TokenRequired);

    match (&token.jwks_url, &token.jwks_file) {
        (Some(_), Some(_)) => errors.push(ValidationError::ConflictingKeySources),
        (None, None) if needs_keys => errors.push(ValidationError::MissingKeySource),
        (Some(url), None) => {
            let valid = Url::parse(url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                errors.push(ValidationError::InvalidJwksUrl(url.clone()));
            }
        }
        _ => {}
    }

    if token.fetch_timeout_ms == 0 || token.fetch_timeout_ms > MAX_FETCH_TIMEOUT_MS {
        errors.push(ValidationError::InvalidFetchTimeout(token.fetch_timeout_ms));
    }
    if token.provider_retry.max_attempts == 0 {
        errors.push(ValidationError::InvalidRetryAttempts);
    }
}

fn validate_cors(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    if config.cors.allow_localhost && config.deployment.is_production() {
        errors.push(ValidationError::LocalhostInProduction);
    }

    for origin in &config.cors.allowed_origins {
        let valid = Url::parse(origin)
            .map(|u| {
                matches!(u.scheme(), "http" | "https")
                    && u.host_str().is_some()
                    && u.path() == "/"
                    && u.query().is_none()
            })
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
}

fn validate_emails(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let needs_allowlist = config
        .routes
        .iter()
        .any(|r| r.mode == RouteMode::AllowlistEmail);

    if needs_allowlist && config.email_allowlist.is_empty() {
        errors.push(ValidationError::MissingEmailAllowlist);
    }
    for entry in &config.email_allowlist {
        if EmailRule::parse(entry).is_none() {
            errors.push(ValidationError::InvalidEmailEntry(entry.clone()));
        }
    }
}

fn validate_rate_limit(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let limit = &config.rate_limit;
    if limit.enabled && (limit.requests == 0 || limit.window_ms == 0) {
        errors.push(ValidationError::InvalidRateLimit("rate_limit".to_string()));
    }
}

fn validate_webhooks(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for webhook in &config.webhooks {
        if !seen.insert(webhook.name.as_str()) {
            errors.push(ValidationError::DuplicateWebhook(webhook.name.clone()));
        }
        if webhook.secret.is_empty() {
            errors.push(ValidationError::EmptyWebhookSecret(webhook.name.clone()));
        }
        if webhook.kind == WebhookKind::HmacSha256 && webhook.header.is_none() {
            errors.push(ValidationError::MissingWebhookHeader(webhook.name.clone()));
        }
    }
}
