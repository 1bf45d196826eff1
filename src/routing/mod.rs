//! Endpoint policy subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, method)
//!     → registry.rs (policy lookup)
//!     → matcher.rs (evaluate path patterns)
//!     → Return: EndpointPolicy, UnknownRoute or MethodNotAllowed
//!
//! Compilation (at startup):
//!     RouteConfig[] + email_allowlist
//!     → Compile patterns and methods (policy.rs)
//!     → Split exact map / wildcard list, sort wildcards by specificity
//!     → Freeze as immutable registry
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (exact map + prefix scan)
//! - Deterministic: same input always matches same policy
//! - Allowlists over blocklists for sign-in endpoints

pub mod allowlist;
pub mod matcher;
pub mod policy;
pub mod registry;

pub use allowlist::{EmailAllowlist, EmailRule};
pub use matcher::PathPattern;
pub use policy::{AuthMode, EndpointPolicy};
pub use registry::{EndpointPolicyRegistry, LookupError};
