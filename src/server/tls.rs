//! rustls configuration built from stored credentials.
//!
//! The trust root on both sides is the single CA certificate: servers verify
//! client certificates against it, clients verify the server certificate
//! against it. This is the "give me a TLS credential set" boundary — nothing
//! above this module touches rustls configuration.

use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tracing::debug;

use crate::pki::Credential;
use crate::{Error, Result};

/// Build the server-side TLS configuration.
///
/// When `require_client_cert` is `true`, peers without a valid CA-signed
/// certificate are rejected at the handshake. When `false`, certificates are
/// requested but optional — unauthenticated peers connect holding no role.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the credential material cannot be loaded into
/// rustls or the verifier cannot be built.
pub fn build_server_tls(
    server: &Credential,
    authority: &Credential,
    require_client_cert: bool,
) -> Result<Arc<ServerConfig>> {
    let root_store = authority_root_store(authority)?;
    let verifier_builder = WebPkiClientVerifier::builder(Arc::new(root_store));
    let verifier = if require_client_cert {
        verifier_builder.build()
    } else {
        verifier_builder.allow_unauthenticated().build()
    }
    .map_err(|e| Error::Tls(format!("Failed to build client verifier: {e}")))?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(vec![server.certificate()], server.private_key_der()?)
        .map_err(|e| Error::Tls(format!("TLS config error (cert/key mismatch?): {e}")))?;

    debug!(require_client_cert, "Server TLS config built");
    Ok(Arc::new(config))
}

/// Build the client-side TLS configuration: CA trust root plus the client's
/// own credential for mutual authentication.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the credential material cannot be loaded into
/// rustls.
pub fn build_client_tls(
    client: &Credential,
    authority: &Credential,
) -> Result<Arc<ClientConfig>> {
    let root_store = authority_root_store(authority)?;
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_auth_cert(vec![client.certificate()], client.private_key_der()?)
        .map_err(|e| Error::Tls(format!("TLS config error (cert/key mismatch?): {e}")))?;
    Ok(Arc::new(config))
}

fn authority_root_store(authority: &Credential) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    store
        .add(authority.certificate())
        .map_err(|e| Error::Tls(format!("Failed to add CA certificate to trust store: {e}")))?;
    Ok(store)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
