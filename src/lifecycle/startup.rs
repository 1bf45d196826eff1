//! Startup orchestration.
//!
//! # Responsibilities
//! - Pick the identity provider key source from configuration
//! - Warm the key cache before traffic arrives
//! - Assemble the request pipeline
//!
//! # Design Decisions
//! - Configuration errors are fatal; a cold key cache is not
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{FileKeyProvider, HttpKeyProvider, KeyProvider, KeySetError, TokenVerifier};
use crate::config::{GateConfig, TokenConfig};
use crate::pipeline::RequestPipeline;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("identity provider setup failed: {0}")]
    KeyProvider(#[from] KeySetError),
    #[error("invalid bind address {0}: {1}")]
    BindAddress(String, std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key provider for the configured source, if any.
pub fn key_provider(config: &TokenConfig) -> Result<Option<Arc<dyn KeyProvider>>, KeySetError> {
    if let Some(url) = &config.jwks_url {
        let timeout = Duration::from_millis(config.fetch_timeout_ms);
        return Ok(Some(Arc::new(HttpKeyProvider::new(url.clone(), timeout)?)));
    }
    if let Some(path) = &config.jwks_file {
        return Ok(Some(Arc::new(FileKeyProvider::new(path.clone()))));
    }
    Ok(None)
}

/// Build the pipeline, warming the key cache when a provider is configured.
pub async fn build_pipeline(config: &GateConfig) -> Result<RequestPipeline, StartupError> {
    let mut builder = RequestPipeline::builder(config);

    match key_provider(&config.token)? {
        Some(provider) => {
            let verifier = Arc::new(TokenVerifier::new(provider, (&config.token).into()));
            verifier.prime().await;
            builder = builder.with_verifier(verifier);
        }
        None => tracing::info!("No identity provider configured, token routes will deny"),
    }

    let pipeline = builder.build();
    tracing::info!(
        routes = config.routes.len(),
        webhooks = config.webhooks.len(),
        deployment = ?config.deployment,
        "Request pipeline ready"
    );
    Ok(pipeline)
}
