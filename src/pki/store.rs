//! Idempotent, file-backed credential persistence.
//!
//! [`ensure`] is the only write path: load-if-present, create-if-absent.
//! A credential that exists on disk is never re-signed or regenerated, so
//! serial numbers and certificate bytes stay stable across process restarts.
//! A corrupt archive is a fatal error, never a silent regeneration — the
//! certificate may already be distributed as a trust root.
//!
//! Concurrent first-time calls racing on one path are not handled; the
//! orchestrator runs single-threaded before the listener starts (see
//! [`crate::bootstrap`]).

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::pki::codec::{self, Credential};
use crate::{Error, Result};

/// Load the credential at `path`, or create it with `factory` and persist it.
///
/// On creation, writes the binary archive plus companion `<alias>.key` and
/// `<alias>.crt` PEM files next to it, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::Store`] if an existing archive cannot be read or decoded,
/// if the stored alias does not match `alias`, or if persistence fails.
/// Factory errors are propagated unchanged.
pub fn ensure<F>(path: &Path, alias: &str, factory: F) -> Result<Credential>
where
    F: FnOnce() -> Result<Credential>,
{
    if path.exists() {
        let credential = load(path, alias)?;
        debug!(alias, path = %path.display(), "Loaded existing credential");
        return Ok(credential);
    }

    let credential = factory()?;
    persist(path, alias, &credential)?;
    info!(alias, path = %path.display(), "Created credential");
    Ok(credential)
}

/// Load an existing credential archive.
///
/// # Errors
///
/// Returns [`Error::Store`] if the archive is missing, unreadable, corrupt,
/// or stored under a different alias.
pub fn load(path: &Path, alias: &str) -> Result<Credential> {
    let bytes = fs::read(path).map_err(|e| {
        Error::Store(format!(
            "Cannot read credential archive '{}': {e}",
            path.display()
        ))
    })?;
    let (stored_alias, credential) = codec::decode_archive(&bytes).map_err(|e| {
        Error::Store(format!(
            "Corrupt credential archive '{}' (refusing to regenerate): {e}",
            path.display()
        ))
    })?;
    if stored_alias != alias {
        return Err(Error::Store(format!(
            "Credential archive '{}' holds alias '{stored_alias}', expected '{alias}'",
            path.display()
        )));
    }
    Ok(credential)
}

/// Write the archive and companion PEM files.
///
/// The archive is written last, via temp file + rename: it is the load source
/// of truth, so a crash mid-persist leaves no archive and the next start
/// re-creates the credential cleanly.
fn persist(path: &Path, alias: &str, credential: &Credential) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::Store(format!(
            "Credential path '{}' has no parent directory",
            path.display()
        ))
    })?;
    fs::create_dir_all(parent).map_err(|e| {
        Error::Store(format!(
            "Cannot create store directory '{}': {e}",
            parent.display()
        ))
    })?;

    write_file(&parent.join(format!("{alias}.key")), credential.key_pem().as_bytes())?;
    write_file(&parent.join(format!("{alias}.crt")), credential.cert_pem().as_bytes())?;

    let bytes = codec::encode_archive(alias, credential)?;
    let tmp = path.with_extension("cred.tmp");
    write_file(&tmp, &bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        Error::Store(format!(
            "Cannot move credential archive into place at '{}': {e}",
            path.display()
        ))
    })?;

    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)
        .map_err(|e| Error::Store(format!("Cannot write '{}': {e}", path.display())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
