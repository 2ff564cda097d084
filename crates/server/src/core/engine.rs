//! Protocol Engine
//!
//! The WebDAV engine every authorized request is handed to. The gates only
//! see the [`ProtocolEngine`] trait; production mounts use [`DavEngine`],
//! a `dav-server` handler bound to the mount's storage root.

use crate::core::ctx::Ctx;
use crate::core::registry::ServiceEntry;
use async_trait::async_trait;
use axum::{body::Body, extract::Request, response::Response};
use dav_server::{localfs::LocalFs, memls::MemLs, DavHandler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Terminal stage of a mount's pipeline.
#[async_trait]
pub trait ProtocolEngine: Send + Sync + 'static {
    async fn serve(&self, req: Request) -> Response;
}

/// Builds the engine bound to one mount. Called once per mount at startup.
pub trait EngineFactory {
    fn engine_for(&self, entry: &ServiceEntry) -> Arc<dyn ProtocolEngine>;
}

/// WebDAV over the local filesystem, with its own in-memory lock system.
#[derive(Clone)]
pub struct DavEngine {
    mount: String,
    root: PathBuf,
    handler: DavHandler,
}

impl DavEngine {
    pub fn new(entry: &ServiceEntry) -> Self {
        let handler = DavHandler::builder()
            .filesystem(LocalFs::new(&entry.root_dir, false, false, false))
            .locksystem(MemLs::new())
            .strip_prefix(entry.strip_prefix())
            .build_handler();

        Self {
            mount: entry.prefix(),
            root: entry.root_dir.clone(),
            handler,
        }
    }
}

#[async_trait]
impl ProtocolEngine for DavEngine {
    async fn serve(&self, req: Request) -> Response {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let user = req
            .extensions()
            .get::<Ctx>()
            .map(|ctx| ctx.username().to_string())
            .unwrap_or_default();

        let response = self.handler.handle(req).await.map(Body::new);

        let status = response.status();
        if status.is_server_error() {
            error!(
                "WEBDAV [{} {}]: {} user={} root={:?} ERROR: {}",
                self.mount, method, uri, user, self.root, status
            );
        } else {
            info!(
                "WEBDAV [{} {}]: {} user={} {}",
                self.mount, method, uri, user, status
            );
        }
        response
    }
}

/// Production factory: one [`DavEngine`] per mount.
#[derive(Debug, Clone, Copy, Default)]
pub struct DavEngines;

impl EngineFactory for DavEngines {
    fn engine_for(&self, entry: &ServiceEntry) -> Arc<dyn ProtocolEngine> {
        Arc::new(DavEngine::new(entry))
    }
}
