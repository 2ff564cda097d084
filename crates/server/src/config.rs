//! Server configuration
//!
//! Loaded once at startup from `config.yaml`. The file declares the
//! listening port and one entry per WebDAV mount.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed configuration file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One mount as written in the config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    pub root_dir: PathBuf,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// `"readonly"` or `"readwrite"`. Anything else is treated as read-write.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Whole config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(deserialize_with = "port_from_str_or_int")]
    pub port: u16,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Bind address for the listener (all interfaces).
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

// Ports are commonly quoted in YAML; accept both forms.
fn port_from_str_or_int<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Int(u16),
        Str(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Int(port) => Ok(port),
        Port::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = ServerConfig::from_yaml(
            r#"
port: "8080"
services:
  docs:
    root_dir: /data/docs
    username: alice
    password: pw1
    mode: readwrite
  archive:
    root_dir: /data/archive
    username: bob
    password: pw2
    mode: readonly
"#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.services.len(), 2);
        let archive = &config.services["archive"];
        assert_eq!(archive.root_dir, PathBuf::from("/data/archive"));
        assert_eq!(archive.username, "bob");
        assert_eq!(archive.mode.as_deref(), Some("readonly"));
    }

    #[test]
    fn test_integer_port_and_missing_mode() {
        let config = ServerConfig::from_yaml(
            "port: 9000\nservices:\n  docs:\n    root_dir: ./docs\n    username: a\n    password: b\n",
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.services["docs"].mode, None);
        assert_eq!(config.listen_addr(), SocketAddr::from(([0, 0, 0, 0], 9000)));
    }

    #[test]
    fn test_missing_services_is_empty() {
        let config = ServerConfig::from_yaml("port: 80\n").unwrap();
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_bad_port_rejected() {
        assert!(matches!(
            ServerConfig::from_yaml("port: \"http\"\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(ServerConfig::from_yaml("port: 70000\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(ServerConfig::from_yaml("port: [unclosed").is_err());
    }
}
