//! Mount Router
//!
//! Maps the first path segment of a request to the pipeline of the mount
//! with that name. Each pipeline is composed once at startup:
//! credential gate, then policy gate, then the mount's engine.

use crate::core::auth::mw_require_basic_auth;
use crate::core::engine::{EngineFactory, ProtocolEngine};
use crate::core::error::Error;
use crate::core::policy::mw_enforce_policy;
use crate::core::registry::{encode_segment, ServiceEntry, ServiceRegistry};
use axum::{
    extract::{Request, State},
    http::{header, uri::PathAndQuery, StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, info_span, warn, Instrument, Level};

/// Fixed mapping from mount name to its composed pipeline.
#[derive(Clone, Default)]
pub struct MountTable {
    mounts: Arc<HashMap<String, Router>>,
}

impl MountTable {
    pub fn build(registry: &ServiceRegistry, engines: &impl EngineFactory) -> Self {
        let mounts = registry
            .iter()
            .map(|entry| {
                let engine = engines.engine_for(entry);
                info!(
                    "Registered WebDAV service at {} with root {:?} (mode: {})",
                    entry.prefix(),
                    entry.root_dir,
                    entry.policy.as_str()
                );
                (entry.name.clone(), pipeline(Arc::new(entry.clone()), engine))
            })
            .collect();

        Self {
            mounts: Arc::new(mounts),
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(self)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
    }
}

/// Build the top-level application router for `registry`.
pub fn router(registry: &ServiceRegistry, engines: &impl EngineFactory) -> Router {
    MountTable::build(registry, engines).into_router()
}

// The last layer added runs first: auth, then policy, then the engine.
fn pipeline(entry: Arc<ServiceEntry>, engine: Arc<dyn ProtocolEngine>) -> Router {
    Router::new()
        .fallback(move |req: Request| {
            let engine = engine.clone();
            async move { engine.serve(req).await }
        })
        .layer(from_fn_with_state(entry.clone(), mw_enforce_policy))
        .layer(from_fn_with_state(entry, mw_require_basic_auth))
}

async fn dispatch(State(table): State<MountTable>, mut req: Request) -> Response {
    let raw = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    // Clean the decoded path so `%2e%2e` counts as `..`.
    let decoded = percent_decode_str(&raw).decode_utf8_lossy();
    let cleaned = clean_path(&decoded);
    if cleaned != decoded {
        return redirect(&encode_path(&cleaned), query.as_deref());
    }

    let Some((raw_name, rest)) = split_mount(&raw) else {
        info!("No mount for {} {}", req.method(), raw);
        return Error::MountNotFound.into_response();
    };
    let name = percent_decode_str(raw_name).decode_utf8_lossy();
    let Some(mount) = table.mounts.get(&*name) else {
        info!("No mount for {} {}", req.method(), raw);
        return Error::MountNotFound.into_response();
    };
    let wire_name = encode_segment(&name);
    let Some(rest) = rest else {
        // `/<name>` without the trailing slash: point at the subtree.
        return redirect(&format!("/{wire_name}/"), query.as_deref());
    };

    // The engine strips the canonical wire form of the mount name.
    if raw_name != wire_name {
        match canonical_uri(&wire_name, rest, query.as_deref()) {
            Some(uri) => *req.uri_mut() = uri,
            None => {
                warn!("Unable to rewrite {} for mount {}", raw, name);
                return Error::MountNotFound.into_response();
            }
        }
    }

    let span = info_span!("mount", mount = %name, method = %req.method(), path = %raw);
    match mount.clone().oneshot(req).instrument(span).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

fn canonical_uri(wire_name: &str, rest: &str, query: Option<&str>) -> Option<Uri> {
    let path_and_query = match query {
        Some(q) => format!("/{wire_name}/{rest}?{q}"),
        None => format!("/{wire_name}/{rest}"),
    };
    let path_and_query = PathAndQuery::try_from(path_and_query).ok()?;
    Uri::builder()
        .path_and_query(path_and_query)
        .build()
        .ok()
}

/// Split `/<name>/<rest>` into `(name, Some(rest))`, or `/<name>` into
/// `(name, None)`. Returns `None` for `/`.
fn split_mount(path: &str) -> Option<(&str, Option<&str>)> {
    let trimmed = path.strip_prefix('/')?;
    let (name, rest) = match trimmed.split_once('/') {
        Some((name, rest)) => (name, Some(rest)),
        None => (trimmed, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((name, rest))
}

/// Canonical form of a request path: no `.` or `..` segments, no repeated
/// slashes, trailing slash kept.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = format!("/{}", segments.join("/"));
    let dir_like = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    if cleaned != "/" && dir_like {
        cleaned.push('/');
    }
    cleaned
}

/// Re-encode a decoded path, segment by segment.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn redirect(path: &str, query: Option<&str>) -> Response {
    let location = match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}
