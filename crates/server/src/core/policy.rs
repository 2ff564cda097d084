//! Policy Gate
//!
//! Blocks mutating WebDAV verbs on read-only mounts. Runs after the
//! credential gate, so only authenticated callers learn a mount is
//! read-only.

use crate::core::error::{Error, Result};
use crate::core::registry::{AccessPolicy, ServiceEntry};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

/// Verbs that alter stored content or structure.
pub const MUTATING_METHODS: [&str; 7] =
    ["PUT", "POST", "DELETE", "MKCOL", "PROPPATCH", "MOVE", "COPY"];

pub fn is_mutating(method: &Method) -> bool {
    MUTATING_METHODS.contains(&method.as_str())
}

pub fn check(method: &Method, policy: AccessPolicy) -> Result<()> {
    if policy.is_read_only() && is_mutating(method) {
        return Err(Error::ReadOnly {
            method: method.clone(),
        });
    }
    Ok(())
}

pub async fn mw_enforce_policy(
    State(entry): State<Arc<ServiceEntry>>,
    req: Request,
    next: Next,
) -> Result<Response> {
    if let Err(e) = check(req.method(), entry.policy) {
        warn!(
            "Blocked {} request in read-only mode: {} [{}]",
            req.method(),
            req.uri(),
            entry.name
        );
        return Err(e);
    }
    Ok(next.run(req).await)
}
