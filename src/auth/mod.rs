//! Caller authentication subsystem.
//!
//! # Data Flow
//! ```text
//! token-required route:
//!     Authorization: Bearer <jws>  (or session cookie)
//!     → token.rs (parse, kid lookup, EdDSA signature, exp/nbf/iss/aud)
//!         → jwks.rs (cached key set; one refresh on unknown kid)
//!     → Identity
//!
//! signature-required route:
//!     raw body + provider headers
//!     → signature.rs (provider verifier, constant-time HMAC compare)
//! ```
//!
//! # Design Decisions
//! - Key cache reads are lock-free snapshots; refresh is single-writer
//! - Key rotation tolerated with exactly one refresh per request
//! - Network failures are reported, not retried, here; the caller owns backoff

pub mod identity;
pub mod jwks;
pub mod signature;
pub mod token;

pub use identity::Identity;
pub use jwks::{
    FileKeyProvider, HttpKeyProvider, Jwk, JwkSet, KeyProvider, KeySet, KeySetError,
    StaticKeyProvider,
};
pub use signature::{
    sign_stripe_payload, HmacSignatureVerifier, SignatureError, SignatureVerifier,
    SignatureVerifiers, StripeSignatureVerifier,
};
pub use token::{unix_now, IdentityVerifier, TokenError, TokenVerifier, VerifierSettings};
