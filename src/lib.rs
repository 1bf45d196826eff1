//! Request Gate Library
//!
//! Layered authorization in front of an HTTP application: bot filtering,
//! CORS, per-route auth policy, identity or signature verification and rate
//! limiting, evaluated in that order for every request.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GateConfig;
pub use http::GateServer;
pub use lifecycle::Shutdown;
pub use pipeline::{GateRequest, PipelineVerdict, RequestPipeline};
