//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::security::classifier::BotSignature;

/// Root configuration for the request gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Deployment mode; gates development-only conveniences.
    pub deployment: DeploymentMode,

    /// Allowed sign-in addresses: exact emails or `@domain` entries.
    pub email_allowlist: Vec<String>,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Automated client filtering.
    pub bots: BotConfig,

    /// Bearer token verification.
    pub token: TokenConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Endpoint policy table.
    pub routes: Vec<RouteConfig>,

    /// Webhook signature providers referenced by `signature-required` routes.
    pub webhooks: Vec<WebhookConfig>,
}

/// Where the gate is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Production,
    Staging,
    Development,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for gate + handler) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests.
    pub allowed_origins: Vec<String>,

    /// Append `localhost_origin` to the allowlist. Rejected in production.
    pub allow_localhost: bool,

    /// Origin appended when `allow_localhost` is set outside production.
    pub localhost_origin: String,

    /// Methods advertised in preflight responses.
    pub allowed_methods: Vec<String>,

    /// Request headers advertised in preflight responses.
    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,

    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_localhost: false,
            localhost_origin: "http://localhost:3000".to_string(),
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["authorization".to_string(), "content-type".to_string()],
            max_age_secs: 600,
            allow_credentials: false,
        }
    }
}

/// Automated client filtering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    /// Crawler signatures matched case-insensitively against the user-agent.
    pub signatures: Vec<BotSignature>,

    /// User-agents shorter than this are treated as scripted clients.
    pub min_user_agent_len: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            signatures: BotSignature::known().to_vec(),
            min_user_agent_len: 10,
        }
    }
}

/// Bearer token verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Identity provider JWKS endpoint.
    pub jwks_url: Option<String>,

    /// JWKS document on disk, re-read on every refresh.
    pub jwks_file: Option<PathBuf>,

    /// Expected `iss` claim.
    pub issuer: Option<String>,

    /// Expected `aud` claim.
    pub audience: Option<String>,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds.
    pub leeway_secs: u64,

    /// Timeout for a single key-set fetch in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Cookie carrying the same token for browser sessions.
    pub session_cookie: Option<String>,

    /// Backoff applied by the pipeline when the provider is unreachable.
    pub provider_retry: RetryConfig,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            jwks_url: None,
            jwks_file: None,
            issuer: None,
            audience: None,
            leeway_secs: 0,
            fetch_timeout_ms: 2000,
            session_cookie: None,
            provider_retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per window and key.
    pub requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum number of tracked keys.
    pub max_keys: usize,

    /// Interval of the expired-window sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 60,
            window_ms: 60_000,
            max_keys: 100_000,
            sweep_interval_secs: 30,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes buffered for inspection.
    pub max_body_size: usize,

    /// Take the client IP from the first `X-Forwarded-For` hop.
    pub trust_forwarded_for: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
            trust_forwarded_for: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Authorization mode of a route as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteMode {
    Public,
    TokenRequired,
    SignatureRequired,
    AllowlistEmail,
}

/// Route policy entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Exact path (`/api/data`) or wildcard prefix (`/api/*`).
    pub path: String,

    /// Authorization mode.
    pub mode: RouteMode,

    /// Allowed methods; empty allows any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Webhook provider name for `signature-required` routes.
    #[serde(default)]
    pub signature_provider: Option<String>,

    /// Per-route rate limit override.
    #[serde(default)]
    pub rate_limit: Option<RouteRateLimit>,
}

/// Per-route rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteRateLimit {
    pub requests: u32,
    pub window_ms: u64,
}

/// Webhook signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookKind {
    /// `Stripe-Signature: t=<ts>,v1=<hex>` over `"{t}.{body}"`.
    Stripe,
    /// Hex HMAC-SHA256 of the body in a configurable header.
    HmacSha256,
}

/// Webhook signature provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Name referenced by `RouteConfig::signature_provider`.
    pub name: String,

    pub kind: WebhookKind,

    /// Shared signing secret.
    pub secret: String,

    /// Signature header for `hmac-sha256` providers.
    #[serde(default)]
    pub header: Option<String>,

    /// Maximum signature age in seconds (stripe only).
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,
}

fn default_tolerance_secs() -> u64 {
    300
}
