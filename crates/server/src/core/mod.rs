//! Core Service Layer
//!
//! Request routing and policy enforcement for the WebDAV mounts:
//! the immutable service registry, the per-mount credential and policy
//! gates, and the router that composes them in front of each engine.

pub mod auth;
pub mod ctx;
pub mod engine;
pub mod error;
pub mod policy;
pub mod registry;
pub mod router;

// Re-exports for convenience
pub use ctx::Ctx;
pub use engine::{DavEngine, DavEngines, EngineFactory, ProtocolEngine};
pub use error::{Error, Result};
pub use registry::{AccessPolicy, Credential, ServiceEntry, ServiceRegistry};
pub use router::{router, MountTable};
