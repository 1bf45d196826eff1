//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderValue, Method};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

use request_gate::auth::{
    unix_now, Identity, IdentityVerifier, Jwk, JwkSet, KeyProvider, KeySetError,
    StaticKeyProvider, TokenError, TokenVerifier,
};
use request_gate::config::{parse_config, GateConfig};
use request_gate::pipeline::{GateRequest, RequestPipeline};

pub const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const GOOGLEBOT_UA: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
pub const APP_ORIGIN: &str = "https://app.example.com";
pub const WEBHOOK_SECRET: &str = "whsec_integration";

pub const CONFIG: &str = r#"
deployment = "production"
email_allowlist = ["@company.com", "partner@agency.io"]

[cors]
allowed_origins = ["https://app.example.com"]
allow_credentials = true

[token]
jwks_url = "https://id.example.com/.well-known/jwks.json"
issuer = "https://id.example.com"
session_cookie = "session"

[token.provider_retry]
max_attempts = 3
base_delay_ms = 1
max_delay_ms = 5

[rate_limit]
requests = 3
window_ms = 60000

[security]
max_body_size = 1024
trust_forwarded_for = true

[[routes]]
path = "/health"
mode = "public"
methods = ["GET"]

[[routes]]
path = "/public/*"
mode = "public"

[[routes]]
path = "/api/*"
mode = "token-required"

[[routes]]
path = "/api/reports"
mode = "token-required"
methods = ["GET"]

[[routes]]
path = "/api/stripe/webhooks"
mode = "signature-required"
methods = ["POST"]
signature_provider = "stripe"

[[routes]]
path = "/auth/sign-in"
mode = "allowlist-email"
methods = ["POST"]
rate_limit = { requests = 10, window_ms = 60000 }

[[webhooks]]
name = "stripe"
kind = "stripe"
secret = "whsec_integration"
"#;

pub fn config() -> GateConfig {
    parse_config(CONFIG).expect("integration config is valid")
}

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

/// Compact EdDSA JWS over `claims`.
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

/// Valid claims for `sub`, expiring in an hour.
pub fn claims(sub: &str, email: Option<&str>) -> Value {
    let now = unix_now();
    let mut claims = json!({
        "sub": sub,
        "iss": "https://id.example.com",
        "iat": now,
        "exp": now + 3600,
    });
    if let Some(email) = email {
        claims["email"] = json!(email);
    }
    claims
}

/// Counts calls, delegating to a real verifier.
pub struct CountingVerifier {
    inner: TokenVerifier,
    calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn new(inner: TokenVerifier) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for CountingVerifier {
    async fn verify(&self, raw_token: &str) -> Result<Identity, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(raw_token).await
    }
}

/// Key provider that is always down.
#[derive(Debug, Default)]
pub struct DownKeyProvider {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl KeyProvider for DownKeyProvider {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Err(KeySetError::Unavailable("connection refused".to_string()))
    }
}

pub struct Harness {
    pub config: GateConfig,
    pub pipeline: Arc<RequestPipeline>,
    pub keys: Arc<StaticKeyProvider>,
    pub verifier: Arc<CountingVerifier>,
    pub signer: SigningKey,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: GateConfig) -> Self {
        let signer = signing_key(1);
        let keys = Arc::new(StaticKeyProvider::new(jwks(&[("k1", &signer)])));
        let token_verifier = TokenVerifier::new(keys.clone(), (&config.token).into());
        let verifier = Arc::new(CountingVerifier::new(token_verifier));
        let pipeline = Arc::new(
            RequestPipeline::builder(&config)
                .with_verifier(verifier.clone())
                .build(),
        );
        Self {
            config,
            pipeline,
            keys,
            verifier,
            signer,
        }
    }

    pub fn token(&self, sub: &str, email: Option<&str>) -> String {
        mint(&self.signer, "k1", &claims(sub, email))
    }
}

/// Browser-like request from 198.51.100.10.
pub fn request(method: Method, path: &str) -> GateRequest {
    let mut req = GateRequest::new(method, path, IpAddr::V4(Ipv4Addr::new(198, 51, 100, 10)));
    req.headers
        .insert(header::USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    req
}

pub fn with_header(mut req: GateRequest, name: header::HeaderName, value: &str) -> GateRequest {
    req.headers.insert(name, HeaderValue::from_str(value).unwrap());
    req
}

pub fn bearer(req: GateRequest, token: &str) -> GateRequest {
    with_header(req, header::AUTHORIZATION, &format!("Bearer {token}"))
}
