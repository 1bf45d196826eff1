//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DeploymentMode, RouteMode, WebhookKind};

    const SAMPLE: &str = r#"
deployment = "development"
email_allowlist = ["@company.com", "ops@partner.io"]

[cors]
allowed_origins = ["https://app.example.com"]
allow_localhost = true

[token]
jwks_url = "https://id.example.com/.well-known/jwks.json"
issuer = "https://id.example.com"

[rate_limit]
requests = 3
window_ms = 1000

[[routes]]
path = "/api/*"
mode = "token-required"

[[routes]]
path = "/api/stripe/webhooks"
mode = "signature-required"
methods = ["POST"]
signature_provider = "stripe"

[[routes]]
path = "/auth/sign-in"
mode = "allowlist-email"
rate_limit = { requests = 5, window_ms = 60000 }

[[webhooks]]
name = "stripe"
kind = "stripe"
secret = "whsec_test"
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.deployment, DeploymentMode::Development);
        assert_eq!(config.routes.len(), 3);
        assert_eq!(config.routes[1].mode, RouteMode::SignatureRequired);
        assert_eq!(config.routes[2].rate_limit.unwrap().requests, 5);
        assert_eq!(config.webhooks[0].kind, WebhookKind::Stripe);
        assert_eq!(config.webhooks[0].tolerance_secs, 300);
        assert_eq!(config.token.fetch_timeout_ms, 2000);
        assert_eq!(config.bots.min_user_agent_len, 10);
    }

    #[test]
    fn test_validation_errors_surface() {
        let content = r#"
[[routes]]
path = "/api/data"
mode = "token-required"
"#;
        match parse_config(content) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.contains(&ValidationError::MissingKeySource));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            parse_config("routes = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
