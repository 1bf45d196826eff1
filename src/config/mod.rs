//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → compiled into pipeline components, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any error is fatal: the process must not start on a bad config

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BotConfig, CorsConfig, DeploymentMode, GateConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RetryConfig, RouteConfig, RouteMode, RouteRateLimit,
    SecurityConfig, TimeoutConfig, TokenConfig, WebhookConfig, WebhookKind,
};
pub use validation::ValidationError;
