//! Service Registry
//!
//! Immutable mapping from mount name to storage root, credential and
//! access policy. Built once from [`ServerConfig`] and shared read-only by
//! every request for the life of the process.

use crate::config::{ServerConfig, ServiceConfig};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid service name {0:?}: must be a single non-empty path segment")]
    InvalidName(String),

    #[error("failed to create root directory {path:?} for service {name}: {source}")]
    CreateRoot {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("root {path:?} for service {name} is not a directory")]
    RootNotDirectory { name: String, path: PathBuf },
}

/// Whether a mount accepts mutating verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl AccessPolicy {
    /// Only the exact string `"readonly"` selects [`AccessPolicy::ReadOnly`].
    /// Missing or unrecognized modes fall back to read-write.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            Some("readonly") => AccessPolicy::ReadOnly,
            _ => AccessPolicy::ReadWrite,
        }
    }

    pub fn is_read_only(self) -> bool {
        self == AccessPolicy::ReadOnly
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessPolicy::ReadWrite => "readwrite",
            AccessPolicy::ReadOnly => "readonly",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Plain string equality on both fields. Not constant-time.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

// Keep passwords out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One configured mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub root_dir: PathBuf,
    pub credential: Credential,
    pub policy: AccessPolicy,
}

impl ServiceEntry {
    pub fn new(
        name: impl Into<String>,
        root_dir: impl Into<PathBuf>,
        credential: Credential,
        policy: AccessPolicy,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        Ok(Self {
            name,
            root_dir: root_dir.into(),
            credential,
            policy,
        })
    }

    fn from_config(name: &str, cfg: &ServiceConfig) -> Result<Self, RegistryError> {
        let policy = AccessPolicy::from_mode(cfg.mode.as_deref());
        match cfg.mode.as_deref() {
            None | Some("") | Some("readonly") | Some("readwrite") => {}
            Some(other) => warn!(
                "Service {} has unrecognized mode {:?}, defaulting to readwrite",
                name, other
            ),
        }
        if cfg.username.is_empty() || cfg.password.is_empty() {
            warn!("Service {} has an empty username or password", name);
        }
        Self::new(
            name,
            cfg.root_dir.clone(),
            Credential::new(cfg.username.clone(), cfg.password.clone()),
            policy,
        )
    }

    /// Subtree prefix this mount answers on, e.g. `/docs/`.
    pub fn prefix(&self) -> String {
        format!("/{}/", self.name)
    }

    /// Prefix removed before paths reach the WebDAV engine, e.g. `/docs`.
    /// Uses the wire form of the name, so `my docs` gives `/my%20docs`.
    pub fn strip_prefix(&self) -> String {
        format!("/{}", self.encoded_name())
    }

    /// The name as it appears in forwarded request paths.
    pub fn encoded_name(&self) -> String {
        encode_segment(&self.name)
    }
}

/// Everything but RFC 3986 unreserved characters is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode one path segment in canonical form.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}

/// Mount name to entry. Ordered so startup logs are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    entries: BTreeMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn from_config(config: &ServerConfig) -> Result<Self, RegistryError> {
        let entries = config
            .services
            .iter()
            .map(|(name, cfg)| ServiceEntry::from_config(name, cfg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_entries(entries))
    }

    /// Later entries with a duplicate name replace earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = ServiceEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create every missing storage root. Fails on the first root that
    /// cannot be created or exists but is not a directory.
    pub async fn ensure_roots(&self) -> Result<(), RegistryError> {
        for entry in self.iter() {
            ensure_root(&entry.name, &entry.root_dir).await?;
        }
        Ok(())
    }
}

async fn ensure_root(name: &str, path: &Path) -> Result<(), RegistryError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RegistryError::RootNotDirectory {
            name: name.to_string(),
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Root directory {:?} for {} does not exist, creating it...",
                path, name
            );
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|source| RegistryError::CreateRoot {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                    source,
                })?;
            info!("Created root directory {:?}", path);
            Ok(())
        }
        Err(source) => Err(RegistryError::CreateRoot {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(root: &str, mode: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            root_dir: PathBuf::from(root),
            username: "u".into(),
            password: "p".into(),
            mode: mode.map(String::from),
        }
    }

    #[test]
    fn test_policy_from_mode() {
        assert_eq!(AccessPolicy::from_mode(Some("readonly")), AccessPolicy::ReadOnly);
        assert_eq!(AccessPolicy::from_mode(Some("readwrite")), AccessPolicy::ReadWrite);
        assert_eq!(AccessPolicy::from_mode(None), AccessPolicy::ReadWrite);
        // Case-sensitive on purpose; anything unrecognized is permissive.
        assert_eq!(AccessPolicy::from_mode(Some("ReadOnly")), AccessPolicy::ReadWrite);
        assert_eq!(AccessPolicy::from_mode(Some("ro")), AccessPolicy::ReadWrite);
    }

    #[test]
    fn test_credential_exact_match() {
        let cred = Credential::new("alice", "pw1");
        assert!(cred.matches("alice", "pw1"));
        assert!(!cred.matches("alice", "PW1"));
        assert!(!cred.matches("Alice", "pw1"));
        assert!(!cred.matches("alice", "pw1 "));
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let rendered = format!("{:?}", Credential::new("alice", "secret"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_registry_from_config() {
        let mut config = ServerConfig::from_yaml("port: 80\n").unwrap();
        config
            .services
            .insert("docs".into(), service("/data/docs", None));
        config
            .services
            .insert("archive".into(), service("/data/archive", Some("readonly")));

        let registry = ServiceRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 2);

        let archive = registry.get("archive").unwrap();
        assert_eq!(archive.policy, AccessPolicy::ReadOnly);
        assert_eq!(archive.prefix(), "/archive/");
        assert_eq!(archive.strip_prefix(), "/archive");
        assert_eq!(registry.get("docs").unwrap().policy, AccessPolicy::ReadWrite);

        let names: Vec<_> = registry.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "docs"]);
    }

    #[test]
    fn test_strip_prefix_uses_wire_form() {
        let entry = |name: &str| {
            ServiceEntry::new(name, "/tmp", Credential::new("u", "p"), AccessPolicy::ReadWrite)
                .unwrap()
        };
        assert_eq!(entry("docs").strip_prefix(), "/docs");
        assert_eq!(entry("my docs").strip_prefix(), "/my%20docs");
        assert_eq!(entry("my docs").prefix(), "/my docs/");
        assert_eq!(entry("文档").strip_prefix(), "/%E6%96%87%E6%A1%A3");
        assert_eq!(entry("a-b_c.d~e").encoded_name(), "a-b_c.d~e");
    }

    #[test]
    fn test_invalid_names_rejected() {
        for bad in ["", "a/b", ".", ".."] {
            let result = ServiceEntry::new(bad, "/tmp", Credential::new("u", "p"), AccessPolicy::ReadWrite);
            assert!(matches!(result, Err(RegistryError::InvalidName(_))), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_ensure_roots_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("docs");
        let registry = ServiceRegistry::from_entries([ServiceEntry::new(
            "docs",
            &root,
            Credential::new("u", "p"),
            AccessPolicy::ReadWrite,
        )
        .unwrap()]);

        registry.ensure_roots().await.unwrap();
        assert!(root.is_dir());

        // Idempotent once the directory exists.
        registry.ensure_roots().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_roots_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let registry = ServiceRegistry::from_entries([ServiceEntry::new(
            "docs",
            &file,
            Credential::new("u", "p"),
            AccessPolicy::ReadWrite,
        )
        .unwrap()]);

        assert!(matches!(
            registry.ensure_roots().await,
            Err(RegistryError::RootNotDirectory { .. })
        ));
    }
}
