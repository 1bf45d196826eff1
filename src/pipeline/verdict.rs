//! Pipeline output: stages, reason codes and the verdict.

use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;

use crate::auth::{Identity, SignatureError, TokenError};
use crate::routing::LookupError;
use crate::security::{BlockReason, OriginDecision};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Origin,
    PolicyLookup,
    Authorize,
    RateLimit,
    Admit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classify => "classify",
            Stage::Origin => "origin",
            Stage::PolicyLookup => "policy_lookup",
            Stage::Authorize => "authorize",
            Stage::RateLimit => "rate_limit",
            Stage::Admit => "admit",
        }
    }
}

/// Machine-readable reason for a terminal denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    BotSignatureMatch,
    UserAgentMissing,
    UserAgentTooShort,
    OriginNotAllowlisted,
    PreflightRejected,
    UnknownRoute,
    MethodNotAllowed,
    AuthHeaderMissing,
    TokenInvalid,
    TokenExpired,
    ProviderUnavailable,
    EmailMissing,
    EmailNotAllowlisted,
    SignatureMissing,
    SignatureInvalid,
    SignatureExpired,
    RateExceeded,
    BodyTooLarge,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::BotSignatureMatch => "bot_signature_match",
            DenyReason::UserAgentMissing => "user_agent_missing",
            DenyReason::UserAgentTooShort => "user_agent_too_short",
            DenyReason::OriginNotAllowlisted => "origin_not_allowlisted",
            DenyReason::PreflightRejected => "preflight_rejected",
            DenyReason::UnknownRoute => "unknown_route",
            DenyReason::MethodNotAllowed => "method_not_allowed",
            DenyReason::AuthHeaderMissing => "auth_header_missing",
            DenyReason::TokenInvalid => "token_invalid",
            DenyReason::TokenExpired => "token_expired",
            DenyReason::ProviderUnavailable => "provider_unavailable",
            DenyReason::EmailMissing => "email_missing",
            DenyReason::EmailNotAllowlisted => "email_not_allowlisted",
            DenyReason::SignatureMissing => "signature_missing",
            DenyReason::SignatureInvalid => "signature_invalid",
            DenyReason::SignatureExpired => "signature_expired",
            DenyReason::RateExceeded => "rate_exceeded",
            DenyReason::BodyTooLarge => "body_too_large",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DenyReason::BotSignatureMatch
            | DenyReason::UserAgentMissing
            | DenyReason::UserAgentTooShort
            | DenyReason::OriginNotAllowlisted
            | DenyReason::PreflightRejected
            | DenyReason::EmailMissing
            | DenyReason::EmailNotAllowlisted => StatusCode::FORBIDDEN,
            DenyReason::UnknownRoute => StatusCode::NOT_FOUND,
            DenyReason::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DenyReason::AuthHeaderMissing
            | DenyReason::TokenInvalid
            | DenyReason::TokenExpired
            | DenyReason::ProviderUnavailable => StatusCode::UNAUTHORIZED,
            DenyReason::SignatureMissing
            | DenyReason::SignatureInvalid
            | DenyReason::SignatureExpired => StatusCode::BAD_REQUEST,
            DenyReason::RateExceeded => StatusCode::TOO_MANY_REQUESTS,
            DenyReason::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<&BlockReason> for DenyReason {
    fn from(reason: &BlockReason) -> Self {
        match reason {
            BlockReason::MissingUserAgent => DenyReason::UserAgentMissing,
            BlockReason::UserAgentTooShort => DenyReason::UserAgentTooShort,
            BlockReason::SignatureMatch(_) => DenyReason::BotSignatureMatch,
        }
    }
}

impl From<LookupError> for DenyReason {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::UnknownRoute => DenyReason::UnknownRoute,
            LookupError::MethodNotAllowed => DenyReason::MethodNotAllowed,
        }
    }
}

impl From<&TokenError> for DenyReason {
    fn from(e: &TokenError) -> Self {
        match e {
            TokenError::Invalid(_) => DenyReason::TokenInvalid,
            TokenError::Expired => DenyReason::TokenExpired,
            TokenError::ProviderUnavailable(_) => DenyReason::ProviderUnavailable,
        }
    }
}

impl From<SignatureError> for DenyReason {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::Missing => DenyReason::SignatureMissing,
            SignatureError::Malformed | SignatureError::Invalid => DenyReason::SignatureInvalid,
            SignatureError::Expired => DenyReason::SignatureExpired,
        }
    }
}

/// The single output of the pipeline for one request.
#[derive(Debug, Clone)]
pub struct PipelineVerdict {
    /// Hand the request to the handler.
    pub admit: bool,
    pub status: StatusCode,
    pub reason: Option<DenyReason>,
    pub identity: Option<Identity>,
    pub origin_decision: OriginDecision,
    /// Set on `rate_exceeded`.
    pub retry_after: Option<Duration>,
    /// Stage that produced the verdict.
    pub stage: Stage,
}

impl PipelineVerdict {
    pub fn deny(stage: Stage, reason: DenyReason, origin_decision: OriginDecision) -> Self {
        Self {
            admit: false,
            status: reason.status(),
            reason: Some(reason),
            identity: None,
            origin_decision,
            retry_after: None,
            stage,
        }
    }

    pub fn rate_limited(retry_after: Duration, origin_decision: OriginDecision) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::deny(Stage::RateLimit, DenyReason::RateExceeded, origin_decision)
        }
    }

    /// Terminal answer to a CORS preflight.
    pub fn preflight(origin_decision: OriginDecision) -> Self {
        if origin_decision.allowed {
            Self {
                admit: false,
                status: StatusCode::NO_CONTENT,
                reason: None,
                identity: None,
                origin_decision,
                retry_after: None,
                stage: Stage::Origin,
            }
        } else {
            Self::deny(Stage::Origin, DenyReason::PreflightRejected, origin_decision)
        }
    }

    pub fn admitted(identity: Option<Identity>, origin_decision: OriginDecision) -> Self {
        Self {
            admit: true,
            status: StatusCode::OK,
            reason: None,
            identity,
            origin_decision,
            retry_after: None,
            stage: Stage::Admit,
        }
    }

    pub fn is_preflight(&self) -> bool {
        self.origin_decision.preflight
    }

    /// Reason code for logs and metrics, including non-denial outcomes.
    pub fn outcome(&self) -> &'static str {
        match (&self.reason, self.admit) {
            (Some(reason), _) => reason.code(),
            (None, true) => "admitted",
            (None, false) => "preflight_ok",
        }
    }
}
