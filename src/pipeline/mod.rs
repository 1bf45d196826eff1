//! Request authorization pipeline.
//!
//! # Data Flow
//! ```text
//! GateRequest
//!     → classify      (user-agent bot filter)           → 403
//!     → origin        (CORS allowlist, preflight)       → 204 / 403
//!     → policy lookup (path pattern + method)           → 404 / 405
//!     → authorize     (token / signature / allowlist)   → 401 / 400 / 403
//!     → rate limit    (per identity or per client IP)   → 429
//!     → admit
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed; cheap checks run before any verifier work
//! - The first denial is terminal and carries exactly one reason code
//! - Bots and webhook routes never reach the identity provider

pub mod gate;
pub mod request;
pub mod verdict;

pub use gate::{PipelineBuilder, RequestPipeline};
pub use request::GateRequest;
pub use verdict::{DenyReason, PipelineVerdict, Stage};
