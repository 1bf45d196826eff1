//! Bearer token verification.
//!
//! Tokens are compact JWS (`header.payload.signature`, base64url without
//! padding) signed with EdDSA over Ed25519. Keys come from the identity
//! provider's JWK set and are cached; an unknown `kid` triggers exactly one
//! refresh per request before the token is rejected, which tolerates provider
//! key rotation.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::auth::identity::Identity;
use crate::auth::jwks::{KeyProvider, KeySet, KeySetError};
use crate::config::TokenConfig;
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token invalid: {0}")]
    Invalid(&'static str),
    #[error("token expired")]
    Expired,
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<KeySetError> for TokenError {
    fn from(e: KeySetError) -> Self {
        TokenError::ProviderUnavailable(e.to_string())
    }
}

/// Anything that can turn a raw bearer token into an identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str) -> Result<Identity, TokenError>;
}

/// Claim expectations beyond signature and expiry.
#[derive(Debug, Clone, Default)]
pub struct VerifierSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_secs: u64,
}

impl From<&TokenConfig> for VerifierSettings {
    fn from(config: &TokenConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway_secs: config.leeway_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    kid: Option<String>,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Verifies tokens against a cached provider key set.
#[derive(Debug)]
pub struct TokenVerifier {
    provider: Arc<dyn KeyProvider>,
    keys: ArcSwap<KeySet>,
    refresh_lock: Mutex<()>,
    settings: VerifierSettings,
}

impl TokenVerifier {
    /// Starts with an empty cache; the first token triggers a fetch.
    pub fn new(provider: Arc<dyn KeyProvider>, settings: VerifierSettings) -> Self {
        Self {
            provider,
            keys: ArcSwap::from_pointee(KeySet::default()),
            refresh_lock: Mutex::new(()),
            settings,
        }
    }

    /// Warm the cache at startup. Failure is logged, not fatal.
    pub async fn prime(&self) {
        let generation = self.keys.load().generation;
        if let Err(e) = self.refresh(generation).await {
            tracing::warn!(error = %e, "Initial key set fetch failed, will retry on demand");
        }
    }

    /// Replace the cache unless another task already did so since `seen_generation`.
    async fn refresh(&self, seen_generation: u64) -> Result<(), KeySetError> {
        let _guard = self.refresh_lock.lock().await;
        if self.keys.load().generation != seen_generation {
            return Ok(());
        }

        match self.provider.fetch().await {
            Ok(set) => {
                let compiled = KeySet::compile(&set, seen_generation + 1);
                tracing::info!(
                    keys = compiled.len(),
                    generation = compiled.generation,
                    "Key set refreshed"
                );
                self.keys.store(Arc::new(compiled));
                metrics::record_key_refresh("ok");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Key set refresh failed");
                metrics::record_key_refresh("error");
                Err(e)
            }
        }
    }

    async fn key_for(&self, kid: &str) -> Result<VerifyingKey, TokenError> {
        let snapshot = self.keys.load_full();
        if let Some(key) = snapshot.get(kid) {
            return Ok(*key);
        }

        tracing::debug!(kid, "Unknown key id, refreshing key set once");
        self.refresh(snapshot.generation).await?;
        self.keys
            .load()
            .get(kid)
            .copied()
            .ok_or(TokenError::Invalid("unknown key id"))
    }

    /// Verify a token at the given unix time.
    pub async fn verify_at(&self, raw_token: &str, now: u64) -> Result<Identity, TokenError> {
        let mut parts = raw_token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Invalid("malformed token"));
        };

        let header: JwsHeader = decode_json(header_b64).ok_or(TokenError::Invalid("malformed header"))?;
        if header.alg != "EdDSA" {
            return Err(TokenError::Invalid("unsupported algorithm"));
        }
        let kid = header.kid.ok_or(TokenError::Invalid("missing key id"))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .ok()
            .and_then(|raw| Signature::from_slice(&raw).ok())
            .ok_or(TokenError::Invalid("malformed signature"))?;

        let key = self.key_for(&kid).await?;
        let signing_input = &raw_token[..header_b64.len() + 1 + payload_b64.len()];
        key.verify_strict(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::Invalid("bad signature"))?;

        let claims: Map<String, Value> =
            decode_json(payload_b64).ok_or(TokenError::Invalid("malformed claims"))?;
        self.identity_from_claims(claims, now)
    }

    fn identity_from_claims(&self, claims: Map<String, Value>, now: u64) -> Result<Identity, TokenError> {
        let leeway = self.settings.leeway_secs;

        let expires_at = numeric_claim(&claims, "exp").ok_or(TokenError::Invalid("missing exp"))?;
        if now >= expires_at.saturating_add(leeway) {
            return Err(TokenError::Expired);
        }
        if let Some(nbf) = numeric_claim(&claims, "nbf") {
            if nbf > now.saturating_add(leeway) {
                return Err(TokenError::Invalid("not yet valid"));
            }
        }
        let issued_at = numeric_claim(&claims, "iat").ok_or(TokenError::Invalid("missing iat"))?;

        if let Some(issuer) = &self.settings.issuer {
            if claims.get("iss").and_then(Value::as_str) != Some(issuer.as_str()) {
                return Err(TokenError::Invalid("issuer mismatch"));
            }
        }
        if let Some(audience) = &self.settings.audience {
            let matches = match claims.get("aud") {
                Some(Value::String(aud)) => aud == audience,
                Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(audience.as_str())),
                _ => false,
            };
            if !matches {
                return Err(TokenError::Invalid("audience mismatch"));
            }
        }

        let subject_id = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::Invalid("missing sub"))?
            .to_string();
        let email = claims.get("email").and_then(Value::as_str).map(str::to_string);

        Ok(Identity {
            subject_id,
            email,
            claims,
            issued_at,
            expires_at,
        })
    }
}

#[async_trait]
impl IdentityVerifier for TokenVerifier {
    async fn verify(&self, raw_token: &str) -> Result<Identity, TokenError> {
        self.verify_at(raw_token, unix_now()).await
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(part: &str) -> Option<T> {
    let raw = URL_SAFE_NO_PAD.decode(part).ok()?;
    serde_json::from_slice(&raw).ok()
}

fn numeric_claim(claims: &Map<String, Value>, name: &str) -> Option<u64> {
    let value = claims.get(name)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::jwks::{Jwk, JwkSet};
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::json;

    pub fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub fn jwks(keys: &[(&str, &SigningKey)]) -> JwkSet {
        JwkSet {
            keys: keys
                .iter()
                .map(|(kid, sk)| Jwk::ed25519(*kid, &sk.verifying_key()))
                .collect(),
        }
    }

    pub fn mint(key: &SigningKey, kid: &str, claims: &Value) -> String {
        let header = json!({"alg": "EdDSA", "typ": "JWT", "kid": kid});
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let signature = key.sign(input.as_bytes());
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }
}
