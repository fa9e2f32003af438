//! Startup orchestration: ensure the CA, server, and client credentials.
//!
//! Runs single-threaded and synchronously, before the listener accepts
//! connections. Order matters: the CA must exist before any leaf can be
//! signed. CA and server failures are fatal; per-client failures are
//! collected so one broken identity cannot block the others.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::ClientIdentity;
use crate::pki::codec::Credential;
use crate::pki::{LeafKind, authority, store};
use crate::{Error, Result};

/// Credentials materialized by a successful bootstrap.
pub struct PkiMaterial {
    /// The root CA credential.
    pub authority: Credential,
    /// The server leaf credential.
    pub server: Credential,
    /// Client aliases whose credential could not be ensured, with the cause.
    pub failed_clients: Vec<(String, Error)>,
}

/// Ensure the full credential set under `dir`.
///
/// 1. CA (`ca.cred`) — failure is fatal: no CA, no system.
/// 2. Server leaf (`server.cred`) — failure is fatal: nothing to serve with.
/// 3. One client leaf per configured identity — failures are per-alias and
///    reported in [`PkiMaterial::failed_clients`].
///
/// Idempotent: credentials already on disk are loaded, never regenerated.
///
/// # Errors
///
/// Returns the underlying [`Error`] when the CA or server credential cannot
/// be ensured.
pub fn bootstrap(dir: &Path, clients: &[ClientIdentity]) -> Result<PkiMaterial> {
    let authority = store::ensure(
        &archive_path(dir, "ca"),
        "ca",
        authority::create_root_credential,
    )
    .inspect_err(|e| error!(step = "ca", error = %e, "Bootstrap failed"))?;

    let server = store::ensure(&archive_path(dir, "server"), "server", || {
        authority::issue_leaf_credential(&authority, LeafKind::Server, None)
    })
    .inspect_err(|e| error!(step = "server", error = %e, "Bootstrap failed"))?;

    let mut failed_clients = Vec::new();
    for client in clients {
        let result = store::ensure(&archive_path(dir, &client.alias), &client.alias, || {
            authority::issue_leaf_credential(&authority, LeafKind::Client, Some(&client.role))
        });
        match result {
            Ok(_) => {
                info!(alias = %client.alias, role = %client.role, "Client credential ready");
            }
            Err(e) => {
                error!(alias = %client.alias, error = %e, "Failed to ensure client credential");
                failed_clients.push((client.alias.clone(), e));
            }
        }
    }

    Ok(PkiMaterial {
        authority,
        server,
        failed_clients,
    })
}

/// Archive path for `alias` under the PKI directory.
#[must_use]
pub fn archive_path(dir: &Path, alias: &str) -> PathBuf {
    dir.join(format!("{alias}.cred"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
