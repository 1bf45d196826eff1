//! Identity provider key sets.
//!
//! # Responsibilities
//! - Fetch JWK sets from the provider (HTTP, file, or in-memory)
//! - Compile usable Ed25519 keys into an immutable snapshot keyed by `kid`
//!
//! # Design Decisions
//! - Every fetch has a deadline; a slow provider cannot hold requests hostage
//! - Keys that fail to parse are skipped, not fatal
//! - Snapshots are replaced wholesale, never mutated

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySetError {
    #[error("key provider unreachable: {0}")]
    Unavailable(String),
    #[error("key set document malformed: {0}")]
    Malformed(String),
}

/// One JSON Web Key as published by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// Publish an Ed25519 verifying key.
    pub fn ed25519(kid: impl Into<String>, key: &VerifyingKey) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            kid: Some(kid.into()),
            x: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
            alg: Some("EdDSA".to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    fn verifying_key(&self) -> Option<VerifyingKey> {
        if self.kty != "OKP" || self.crv.as_deref() != Some("Ed25519") {
            return None;
        }
        if matches!(self.key_use.as_deref(), Some(u) if u != "sig") {
            return None;
        }
        let raw = URL_SAFE_NO_PAD.decode(self.x.as_deref()?).ok()?;
        let bytes: [u8; 32] = raw.as_slice().try_into().ok()?;
        VerifyingKey::from_bytes(&bytes).ok()
    }
}

/// A JWKS document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Immutable snapshot of verification keys.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, VerifyingKey>,
    /// Bumped on every successful refresh.
    pub generation: u64,
}

impl KeySet {
    pub fn compile(set: &JwkSet, generation: u64) -> Self {
        let mut keys = HashMap::new();
        for jwk in &set.keys {
            match (jwk.kid.as_ref(), jwk.verifying_key()) {
                (Some(kid), Some(key)) => {
                    keys.insert(kid.clone(), key);
                }
                _ => tracing::warn!(kid = ?jwk.kid, kty = %jwk.kty, "Skipping unusable JWK"),
            }
        }
        Self { keys, generation }
    }

    pub fn get(&self, kid: &str) -> Option<&VerifyingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of the provider's current key set.
#[async_trait]
pub trait KeyProvider: Send + Sync + std::fmt::Debug {
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Fetches the JWKS endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeyProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpKeyProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| KeySetError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl KeyProvider for HttpKeyProvider {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeySetError::Unavailable(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::Malformed(e.to_string()))
    }
}

/// Reads a JWKS document from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeyProvider for FileKeyProvider {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| KeySetError::Unavailable(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&content).map_err(|e| KeySetError::Malformed(e.to_string()))
    }
}

/// In-memory key set; `replace` simulates provider key rotation.
#[derive(Debug, Default)]
pub struct StaticKeyProvider {
    set: ArcSwap<JwkSet>,
    fetches: AtomicUsize,
}

impl StaticKeyProvider {
    pub fn new(set: JwkSet) -> Self {
        Self {
            set: ArcSwap::from_pointee(set),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn replace(&self, set: JwkSet) {
        self.set.store(Arc::new(set));
    }

    /// Number of fetches served so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.set.load().as_ref().clone())
    }
}
