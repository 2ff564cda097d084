//! Credential Gate
//!
//! HTTP Basic authentication scoped to a single mount. Each mount has
//! exactly one credential pair; there is no user database.

pub mod middleware;

use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use crate::core::registry::ServiceEntry;
use axum::http::HeaderMap;
use headers::{authorization::Basic, Authorization, HeaderMapExt};

pub use middleware::mw_require_basic_auth;

/// Check the `Authorization` header against the mount's credential.
///
/// A missing or undecodable header and a wrong username/password both
/// reject; callers map either to the same 401.
pub fn verify(headers: &HeaderMap, entry: &ServiceEntry) -> Result<Ctx> {
    let Authorization(basic) = headers
        .typed_get::<Authorization<Basic>>()
        .ok_or(Error::AuthFailNoCredentials)?;

    if !entry.credential.matches(basic.username(), basic.password()) {
        return Err(Error::AuthFailWrongCredentials);
    }

    Ok(Ctx::new(&entry.name, basic.username()))
}
