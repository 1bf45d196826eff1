//! Ordered stage execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::{unix_now, Identity, IdentityVerifier, SignatureVerifiers, TokenError};
use crate::config::{GateConfig, RateLimitConfig, RetryConfig};
use crate::observability::metrics;
use crate::pipeline::request::GateRequest;
use crate::pipeline::verdict::{DenyReason, PipelineVerdict, Stage};
use crate::resilience::retry_with_backoff;
use crate::routing::{AuthMode, EndpointPolicy, EndpointPolicyRegistry};
use crate::security::{
    Classification, ClientClassifier, OriginDecision, OriginPolicy, RateDecision, RateLimiter,
};

/// Assembles a [`RequestPipeline`] from validated configuration.
pub struct PipelineBuilder {
    classifier: ClientClassifier,
    origins: OriginPolicy,
    registry: EndpointPolicyRegistry,
    signatures: SignatureVerifiers,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    limiter: Option<Arc<RateLimiter>>,
    rate_limit: RateLimitConfig,
    provider_retry: RetryConfig,
    session_cookie: Option<String>,
}

impl PipelineBuilder {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            classifier: ClientClassifier::from_config(&config.bots),
            origins: OriginPolicy::new(&config.cors, config.deployment),
            registry: EndpointPolicyRegistry::from_config(&config.routes, &config.email_allowlist),
            signatures: SignatureVerifiers::from_config(&config.webhooks),
            verifier: None,
            limiter: None,
            rate_limit: config.rate_limit.clone(),
            provider_retry: config.token.provider_retry.clone(),
            session_cookie: config.token.session_cookie.clone(),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Share an existing limiter instead of creating one.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_signatures(mut self, signatures: SignatureVerifiers) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn build(self) -> RequestPipeline {
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(self.rate_limit.max_keys)));
        RequestPipeline {
            classifier: self.classifier,
            origins: self.origins,
            registry: self.registry,
            signatures: self.signatures,
            verifier: self.verifier,
            limiter,
            rate_limit: self.rate_limit,
            provider_retry: self.provider_retry,
            session_cookie: self.session_cookie,
        }
    }
}

/// Runs every request through classify, origin, policy lookup, authorize
/// and rate limit, in that order, stopping at the first denial.
pub struct RequestPipeline {
    classifier: ClientClassifier,
    origins: OriginPolicy,
    registry: EndpointPolicyRegistry,
    signatures: SignatureVerifiers,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    limiter: Arc<RateLimiter>,
    rate_limit: RateLimitConfig,
    provider_retry: RetryConfig,
    session_cookie: Option<String>,
}

impl RequestPipeline {
    pub fn builder(config: &GateConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn origins(&self) -> &OriginPolicy {
        &self.origins
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Evaluate one request. Always returns exactly one verdict.
    pub async fn evaluate(&self, req: &GateRequest) -> PipelineVerdict {
        let start = Instant::now();
        let verdict = self.run(req).await;

        metrics::record_pipeline_duration(start);
        metrics::record_verdict(verdict.stage.as_str(), verdict.outcome(), verdict.status.as_u16());
        log_verdict(req, &verdict);
        verdict
    }

    async fn run(&self, req: &GateRequest) -> PipelineVerdict {
        if let Classification::Block(reason) = self.classifier.classify(req.user_agent()) {
            return PipelineVerdict::deny(
                Stage::Classify,
                DenyReason::from(&reason),
                OriginDecision::default(),
            );
        }

        let origin = self.origins.evaluate(&req.method, req.origin());
        if origin.preflight {
            return PipelineVerdict::preflight(origin);
        }
        if !origin.allowed {
            return PipelineVerdict::deny(Stage::Origin, DenyReason::OriginNotAllowlisted, origin);
        }

        let policy = match self.registry.lookup(&req.path, &req.method) {
            Ok(policy) => policy,
            Err(e) => return PipelineVerdict::deny(Stage::PolicyLookup, e.into(), origin),
        };

        let identity = match self.authorize(policy, req).await {
            Ok(identity) => identity,
            Err(reason) => return PipelineVerdict::deny(Stage::Authorize, reason, origin),
        };

        if let Some(retry_after) = self.check_rate(policy, identity.as_ref(), req) {
            return PipelineVerdict::rate_limited(retry_after, origin);
        }

        PipelineVerdict::admitted(identity, origin)
    }

    async fn authorize(
        &self,
        policy: &EndpointPolicy,
        req: &GateRequest,
    ) -> Result<Option<Identity>, DenyReason> {
        match &policy.mode {
            AuthMode::Public => Ok(None),
            AuthMode::TokenRequired => {
                let token = req
                    .credential(self.session_cookie.as_deref())
                    .ok_or(DenyReason::AuthHeaderMissing)?;
                self.verify_token(token)
                    .await
                    .map(Some)
                    .map_err(|e| DenyReason::from(&e))
            }
            AuthMode::SignatureRequired { provider } => {
                let verifier = self.signatures.get(provider).ok_or_else(|| {
                    tracing::error!(provider = %provider, path = %req.path, "No signature verifier registered");
                    DenyReason::SignatureInvalid
                })?;
                verifier.verify(&req.headers, &req.body, unix_now())?;
                Ok(None)
            }
            AuthMode::AllowlistEmail => {
                let identity = match req.credential(self.session_cookie.as_deref()) {
                    Some(token) => match self.verify_token(token).await {
                        Ok(identity) => Some(identity),
                        Err(e) => {
                            tracing::debug!(error = %e, "Ignoring unverifiable credential on allowlist route");
                            None
                        }
                    },
                    None => None,
                };

                let email = identity
                    .as_ref()
                    .and_then(|i| i.email.clone())
                    .or_else(|| req.body_email())
                    .ok_or(DenyReason::EmailMissing)?;

                if self.registry.is_email_allowed(&email) {
                    Ok(identity)
                } else {
                    Err(DenyReason::EmailNotAllowlisted)
                }
            }
        }
    }

    async fn verify_token(&self, token: &str) -> Result<Identity, TokenError> {
        let verifier = self.verifier.as_ref().ok_or_else(|| {
            TokenError::ProviderUnavailable("no identity provider configured".to_string())
        })?;
        retry_with_backoff(
            &self.provider_retry,
            |e: &TokenError| matches!(e, TokenError::ProviderUnavailable(_)),
            || verifier.verify(token),
        )
        .await
    }

    /// `Some(retry_after)` when the caller is over its limit.
    fn check_rate(
        &self,
        policy: &EndpointPolicy,
        identity: Option<&Identity>,
        req: &GateRequest,
    ) -> Option<Duration> {
        if !self.rate_limit.enabled {
            return None;
        }
        let caller = match identity {
            Some(identity) => identity.rate_key(),
            None => format!("ip:{}", req.client_ip),
        };
        // Route overrides count in their own key space.
        let (key, limit, window_ms) = match &policy.rate_limit {
            Some(route) => (
                format!("{caller}|{}", policy.path_pattern),
                route.requests,
                route.window_ms,
            ),
            None => (caller, self.rate_limit.requests, self.rate_limit.window_ms),
        };
        match self.limiter.check(&key, limit, Duration::from_millis(window_ms)) {
            RateDecision::Admitted { .. } => None,
            RateDecision::Limited { retry_after } => Some(retry_after),
        }
    }
}

fn log_verdict(req: &GateRequest, verdict: &PipelineVerdict) {
    let request_id = req.request_id.as_deref().unwrap_or("-");
    match verdict.reason {
        Some(reason) => tracing::warn!(
            request_id,
            method = %req.method,
            path = %req.path,
            client_ip = %req.client_ip,
            stage = verdict.stage.as_str(),
            reason = reason.code(),
            status = verdict.status.as_u16(),
            "Request denied"
        ),
        None if verdict.admit => tracing::debug!(
            request_id,
            method = %req.method,
            path = %req.path,
            subject = verdict.identity.as_ref().map(|i| i.subject_id.as_str()),
            "Request admitted"
        ),
        None => tracing::debug!(
            request_id,
            path = %req.path,
            origin = verdict.origin_decision.echoed_origin.as_deref(),
            "Preflight answered"
        ),
    }
}
