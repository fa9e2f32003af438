//! Key/certificate codec — credential archives and PEM text files.
//!
//! A [`Credential`] is a private key plus its certificate. On disk each
//! credential lives in two forms:
//!
//! - a binary **archive** (`<alias>.cred`): a versioned, postcard-serialized
//!   record holding the alias, the PKCS#8 private-key PEM, and the raw
//!   certificate DER. The archive is the load source of truth — decoding it
//!   back yields certificate bytes identical to what was stored.
//! - companion **PEM files** (`<alias>.key`, `<alias>.crt`) for operator
//!   inspection with standard tooling.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rcgen::KeyPair;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Archive layout version. Bumped on incompatible changes to
/// [`CredentialArchive`].
const ARCHIVE_VERSION: u8 = 1;

/// Width of base64 lines in PEM output.
const PEM_LINE_WIDTH: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────────────────────────────────────

/// A private key and its X.509 certificate.
///
/// Immutable after creation: role changes are handled by issuing a fresh
/// credential, never by mutating an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// PKCS#8 private key, PEM-encoded.
    key_pem: String,
    /// Certificate, DER-encoded.
    cert_der: Vec<u8>,
}

impl Credential {
    /// Assemble a credential from a PKCS#8 key PEM and certificate DER.
    #[must_use]
    pub fn new(key_pem: String, cert_der: Vec<u8>) -> Self {
        Self { key_pem, cert_der }
    }

    /// The PKCS#8 private key, PEM-encoded.
    #[must_use]
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// The certificate, DER-encoded.
    #[must_use]
    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    /// The certificate, PEM-encoded.
    #[must_use]
    pub fn cert_pem(&self) -> String {
        encode_certificate_pem(&self.cert_der)
    }

    /// The certificate as a rustls type.
    #[must_use]
    pub fn certificate(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.cert_der.clone())
    }

    /// Parse the private key back into a signing key pair.
    pub fn key_pair(&self) -> Result<KeyPair> {
        KeyPair::from_pem(&self.key_pem)
            .map_err(|e| Error::Pki(format!("Failed to parse private key: {e}")))
    }

    /// The private key as a rustls type.
    pub fn private_key_der(&self) -> Result<PrivateKeyDer<'static>> {
        rustls_pemfile::private_key(&mut self.key_pem.as_bytes())
            .map_err(|e| Error::Pki(format!("Failed to parse private key PEM: {e}")))?
            .ok_or_else(|| Error::Pki("No private key found in credential".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Binary archive
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk archive record. The alias is stored so a mis-pathed archive is
/// detected at load time instead of silently impersonating another identity.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialArchive {
    version: u8,
    alias: String,
    key_pem: String,
    cert_der: Vec<u8>,
}

/// Serialize a credential into archive bytes.
pub fn encode_archive(alias: &str, credential: &Credential) -> Result<Vec<u8>> {
    let archive = CredentialArchive {
        version: ARCHIVE_VERSION,
        alias: alias.to_string(),
        key_pem: credential.key_pem.clone(),
        cert_der: credential.cert_der.clone(),
    };
    postcard::to_allocvec(&archive)
        .map_err(|e| Error::Store(format!("Failed to encode credential archive: {e}")))
}

/// Decode archive bytes back into the stored alias and credential.
pub fn decode_archive(bytes: &[u8]) -> Result<(String, Credential)> {
    let archive: CredentialArchive = postcard::from_bytes(bytes)
        .map_err(|e| Error::Store(format!("Failed to decode credential archive: {e}")))?;
    if archive.version != ARCHIVE_VERSION {
        return Err(Error::Store(format!(
            "Unsupported credential archive version {} (expected {ARCHIVE_VERSION})",
            archive.version
        )));
    }
    Ok((
        archive.alias,
        Credential::new(archive.key_pem, archive.cert_der),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// PEM text
// ─────────────────────────────────────────────────────────────────────────────

/// PEM-encode certificate DER bytes.
#[must_use]
pub fn encode_certificate_pem(der: &[u8]) -> String {
    let encoded = BASE64.encode(der);
    let mut pem = String::with_capacity(encoded.len() + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for chunk in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        // chunks of an ASCII string are valid UTF-8
        pem.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Decode the first certificate from a PEM string back to DER bytes.
pub fn decode_certificate_pem(pem: &str) -> Result<Vec<u8>> {
    rustls_pemfile::certs(&mut pem.as_bytes())
        .next()
        .ok_or_else(|| Error::Pki("No certificate found in PEM input".to_string()))?
        .map(|cert| cert.as_ref().to_vec())
        .map_err(|e| Error::Pki(format!("Failed to parse certificate PEM: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pki::authority::create_root_credential;

    #[test]
    fn archive_round_trips_alias_and_credential() {
        let credential = create_root_credential().unwrap();

        let bytes = encode_archive("ca", &credential).unwrap();
        let (alias, restored) = decode_archive(&bytes).unwrap();

        assert_eq!(alias, "ca");
        assert_eq!(restored, credential);
    }

    #[test]
    fn archive_preserves_certificate_der_bytes_exactly() {
        let credential = create_root_credential().unwrap();

        let bytes = encode_archive("ca", &credential).unwrap();
        let (_, restored) = decode_archive(&bytes).unwrap();

        assert_eq!(restored.cert_der(), credential.cert_der());
    }

    #[test]
    fn decode_archive_rejects_garbage() {
        assert!(decode_archive(b"definitely not an archive").is_err());
    }

    #[test]
    fn decode_archive_rejects_truncated_input() {
        let credential = create_root_credential().unwrap();
        let bytes = encode_archive("ca", &credential).unwrap();

        assert!(decode_archive(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn certificate_pem_round_trips_to_der() {
        let credential = create_root_credential().unwrap();

        let pem = encode_certificate_pem(credential.cert_der());
        let der = decode_certificate_pem(&pem).unwrap();

        assert_eq!(der, credential.cert_der());
    }

    #[test]
    fn certificate_pem_lines_are_wrapped() {
        let credential = create_root_credential().unwrap();
        let pem = credential.cert_pem();

        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
        for line in pem.lines().filter(|l| !l.starts_with("-----")) {
            assert!(line.len() <= PEM_LINE_WIDTH);
        }
    }

    #[test]
    fn private_key_der_parses_from_generated_pem() {
        let credential = create_root_credential().unwrap();
        let key = credential.private_key_der().unwrap();
        assert!(!key.secret_der().is_empty());
    }

    #[test]
    fn key_pair_reparses_from_pem() {
        let credential = create_root_credential().unwrap();
        let key_pair = credential.key_pair().unwrap();
        assert_eq!(key_pair.serialize_pem(), credential.key_pem());
    }
}
