//! Request screening subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → classifier.rs (shed crawler / scripted user-agents)
//!     → origin.rs (CORS preflight and origin allowlist)
//!     → [policy lookup and authorization]
//!     → rate_limit.rs (per-caller fixed windows)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod classifier;
pub mod origin;
pub mod rate_limit;

pub use classifier::{BlockReason, BotSignature, Classification, ClientClassifier};
pub use origin::{OriginDecision, OriginPolicy};
pub use rate_limit::{retry_after_secs, RateDecision, RateLimiter, RateWindow};
