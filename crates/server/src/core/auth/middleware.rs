use crate::core::auth;
use crate::core::error::Result;
use crate::core::registry::ServiceEntry;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reject unauthenticated requests before anything else in the mount's
/// pipeline runs.
pub async fn mw_require_basic_auth(
    State(entry): State<Arc<ServiceEntry>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: require_basic_auth [{}]", entry.name);

    let ctx = auth::verify(req.headers(), &entry).inspect_err(|e| {
        warn!(
            "Auth failed for {} {} on {}: {:?}",
            req.method(),
            req.uri(),
            entry.name,
            e
        );
    })?;

    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
