//! Webhook signature verification.
//!
//! Routes in `signature-required` mode skip token verification and are
//! checked by the provider-specific verifier named in their policy.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{WebhookConfig, WebhookKind};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_SIGNATURE: &str = "stripe-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,
    #[error("signature header malformed")]
    Malformed,
    #[error("signature does not match")]
    Invalid,
    #[error("signature timestamp outside tolerance")]
    Expired,
}

/// Provider-specific webhook signature check.
pub trait SignatureVerifier: Send + Sync + std::fmt::Debug {
    /// `now` is unix seconds.
    fn verify(&self, headers: &HeaderMap, body: &[u8], now: u64) -> Result<(), SignatureError>;
}

fn mac_digest(secret: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

fn digest_matches(expected: &[u8], candidate: &[u8]) -> bool {
    !expected.is_empty() && expected.ct_eq(candidate).into()
}

/// Build a `Stripe-Signature` header value for a payload.
pub fn sign_stripe_payload(secret: &[u8], timestamp: u64, body: &[u8]) -> String {
    let prefix = format!("{timestamp}.");
    let digest = mac_digest(secret, &[prefix.as_bytes(), body]);
    format!("t={timestamp},v1={}", hex::encode(digest))
}

/// `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]` over `"{t}.{body}"`.
#[derive(Clone)]
pub struct StripeSignatureVerifier {
    secret: Vec<u8>,
    tolerance_secs: u64,
}

impl std::fmt::Debug for StripeSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeSignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl StripeSignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }
}

impl SignatureVerifier for StripeSignatureVerifier {
    fn verify(&self, headers: &HeaderMap, body: &[u8], now: u64) -> Result<(), SignatureError> {
        let header = headers
            .get(STRIPE_SIGNATURE)
            .ok_or(SignatureError::Missing)?
            .to_str()
            .map_err(|_| SignatureError::Malformed)?;

        let mut timestamp = None;
        let mut candidates = Vec::new();
        for item in header.split(',') {
            match item.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(value.parse::<u64>().map_err(|_| SignatureError::Malformed)?);
                }
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }
        if now.abs_diff(timestamp) > self.tolerance_secs {
            return Err(SignatureError::Expired);
        }

        let prefix = format!("{timestamp}.");
        let expected = mac_digest(&self.secret, &[prefix.as_bytes(), body]);
        let matched = candidates
            .iter()
            .filter_map(|c| hex::decode(c).ok())
            .any(|candidate| digest_matches(&expected, &candidate));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Invalid)
        }
    }
}

/// Hex HMAC-SHA256 of the raw body in a named header, optionally `sha256=`-prefixed.
#[derive(Clone)]
pub struct HmacSignatureVerifier {
    secret: Vec<u8>,
    header: HeaderName,
}

impl std::fmt::Debug for HmacSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSignatureVerifier")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl HmacSignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, header: HeaderName) -> Self {
        Self {
            secret: secret.into(),
            header,
        }
    }
}

impl SignatureVerifier for HmacSignatureVerifier {
    fn verify(&self, headers: &HeaderMap, body: &[u8], _now: u64) -> Result<(), SignatureError> {
        let value = headers
            .get(&self.header)
            .ok_or(SignatureError::Missing)?
            .to_str()
            .map_err(|_| SignatureError::Malformed)?
            .trim();
        let hex_digest = value.strip_prefix("sha256=").unwrap_or(value);
        let candidate = hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)?;

        let expected = mac_digest(&self.secret, &[body]);
        if digest_matches(&expected, &candidate) {
            Ok(())
        } else {
            Err(SignatureError::Invalid)
        }
    }
}

/// Signature verifiers by provider name.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifiers {
    providers: HashMap<String, Arc<dyn SignatureVerifier>>,
}

impl SignatureVerifiers {
    pub fn from_config(webhooks: &[WebhookConfig]) -> Self {
        let mut verifiers = Self::default();
        for hook in webhooks {
            let secret = hook.secret.as_bytes().to_vec();
            match hook.kind {
                WebhookKind::Stripe => {
                    verifiers.register(
                        &hook.name,
                        Arc::new(StripeSignatureVerifier::new(secret, hook.tolerance_secs)),
                    );
                }
                WebhookKind::HmacSha256 => {
                    let header = hook
                        .header
                        .as_deref()
                        .and_then(|h| HeaderName::from_bytes(h.to_ascii_lowercase().as_bytes()).ok());
                    match header {
                        Some(header) => verifiers.register(
                            &hook.name,
                            Arc::new(HmacSignatureVerifier::new(secret, header)),
                        ),
                        None => tracing::error!(
                            provider = %hook.name,
                            "Skipping webhook provider without a valid header"
                        ),
                    }
                }
            }
        }
        verifiers
    }

    pub fn register(&mut self, name: &str, verifier: Arc<dyn SignatureVerifier>) {
        self.providers.insert(name.to_string(), verifier);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SignatureVerifier>> {
        self.providers.get(name)
    }
}
