//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → middleware/gate.rs (buffer body, resolve client IP, run pipeline)
//!         → denied: response.rs (JSON reason, Retry-After, CORS)
//!         → admitted: RequestContext in extensions → handler
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{GateState, RequestContext};
pub use request::X_REQUEST_ID;
pub use server::GateServer;
