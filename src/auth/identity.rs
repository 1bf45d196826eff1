//! Authenticated caller identity.

use serde::Serialize;
use serde_json::{Map, Value};

/// A verified caller. Only produced by the token verifier; lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub email: Option<String>,
    /// Every claim of the verified token, including the registered ones.
    pub claims: Map<String, Value>,
    /// Unix seconds.
    pub issued_at: u64,
    /// Unix seconds.
    pub expires_at: u64,
}

impl Identity {
    /// Rate limiter key for this caller.
    pub fn rate_key(&self) -> String {
        format!("sub:{}", self.subject_id)
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}
