//! Configuration management

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// PKI bootstrap configuration
    pub pki: PkiConfig,
}

/// TCP/TLS listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub listen: String,
    /// Require clients to present a certificate during the handshake.
    /// When `false`, unauthenticated peers may connect; they hold no role and
    /// are denied every operation.
    pub require_client_cert: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:802".to_string(),
            require_client_cert: false,
        }
    }
}

/// PKI bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Directory holding credential archives and companion PEM files
    pub dir: PathBuf,
    /// Client identities ensured at bootstrap
    pub clients: Vec<ClientIdentity>,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./pki"),
            clients: vec![
                ClientIdentity {
                    alias: "client1".to_string(),
                    role: "ReadOnly".to_string(),
                },
                ClientIdentity {
                    alias: "client2".to_string(),
                    role: "ReadWrite".to_string(),
                },
            ],
        }
    }
}

/// A client alias and the role baked into its certificate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Store alias; also the credential file stem
    pub alias: String,
    /// Role string embedded in the certificate's role extension
    pub role: String,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (MODBUS_SENTRY_ prefix)
        figment = figment.merge(Env::prefixed("MODBUS_SENTRY_").split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
