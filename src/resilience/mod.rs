//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the identity provider:
//!     → retries.rs (retry transient failures up to the attempt budget)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every provider call already carries its own fetch timeout
//! - Jittered backoff prevents a thundering herd after a provider blip

pub mod backoff;
pub mod retries;

pub use retries::retry_with_backoff;
