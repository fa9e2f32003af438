//! Certificate authority — self-signed root and role-tagged leaf issuance.
//!
//! The authority is deliberately flat: one self-signed root signs every leaf.
//! Client leaves may carry an authorization role in a private-enterprise
//! extension; the role payload is a DER UTF8String encoded here and decoded
//! by [`crate::pki::identity`].
//!
//! Issuance is pure credential construction — no disk or network I/O. The
//! [`crate::pki::store`] layer owns persistence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
    SerialNumber,
};
use time::{Duration, OffsetDateTime};

use crate::pki::codec::Credential;
use crate::{Error, Result};

/// Common Name of the root authority certificate.
pub const CA_COMMON_NAME: &str = "Modbus CA";
/// Common Name of server leaf certificates.
pub const SERVER_COMMON_NAME: &str = "Modbus Server";
/// Common Name of client leaf certificates.
pub const CLIENT_COMMON_NAME: &str = "Modbus Client";

/// Private-enterprise OID carrying the authorization role on client leaves.
pub const ROLE_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 50316, 802, 1];

/// Validity window applied to every certificate this authority issues.
const VALIDITY_DAYS: i64 = 365;

/// Which kind of leaf credential to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// Server leaf: `serverAuth` EKU and a `DNS:localhost` SAN.
    Server,
    /// Client leaf: `clientAuth` EKU and, if a role is given, the role
    /// extension.
    Client,
}

// ─────────────────────────────────────────────────────────────────────────────
// Issuance
// ─────────────────────────────────────────────────────────────────────────────

/// Generate the self-signed root credential.
///
/// Subject and issuer are both [`CA_COMMON_NAME`]; the certificate is marked
/// `isCA=true` with `keyCertSign|cRLSign` key usage and signed with its own
/// key.
///
/// # Errors
///
/// Returns [`Error::Pki`] if key generation or self-signing fails. Callers
/// treat this as fatal — there is no valid partial state.
pub fn create_root_credential() -> Result<Credential> {
    let key_pair = KeyPair::generate()
        .map_err(|e| Error::Pki(format!("CA key generation failed: {e}")))?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, CA_COMMON_NAME);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.serial_number = Some(SerialNumber::from(next_serial()));
    let (not_before, not_after) = validity_window();
    params.not_before = not_before;
    params.not_after = not_after;

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| Error::Pki(format!("CA certificate generation failed: {e}")))?;

    Ok(Credential::new(key_pair.serialize_pem(), cert.der().to_vec()))
}

/// Issue a leaf credential signed by `authority`.
///
/// The issuer name is the authority's subject name; the serial number is
/// unique per call. The role extension is attached iff `kind` is
/// [`LeafKind::Client`] and `role` is present.
///
/// # Errors
///
/// Returns [`Error::Pki`] if the authority material cannot be parsed, key
/// generation fails, or signing fails.
pub fn issue_leaf_credential(
    authority: &Credential,
    kind: LeafKind,
    role: Option<&str>,
) -> Result<Credential> {
    let ca_key = authority.key_pair()?;
    let issuer = Issuer::from_ca_cert_pem(&authority.cert_pem(), ca_key)
        .map_err(|e| Error::Pki(format!("Failed to parse authority certificate: {e}")))?;

    let leaf_key = KeyPair::generate()
        .map_err(|e| Error::Pki(format!("Leaf key generation failed: {e}")))?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    let cn = match kind {
        LeafKind::Server => SERVER_COMMON_NAME,
        LeafKind::Client => CLIENT_COMMON_NAME,
    };
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.use_authority_key_identifier_extension = true;
    params.serial_number = Some(SerialNumber::from(next_serial()));
    let (not_before, not_after) = validity_window();
    params.not_before = not_before;
    params.not_after = not_after;

    match kind {
        LeafKind::Server => {
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
            let dns = Ia5String::try_from("localhost")
                .map_err(|e| Error::Pki(format!("Invalid DNS SAN: {e}")))?;
            params.subject_alt_names = vec![SanType::DnsName(dns)];
        }
        LeafKind::Client => {
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
            if let Some(role) = role {
                params.custom_extensions = vec![CustomExtension::from_oid_content(
                    ROLE_OID,
                    encode_utf8_string(role)?,
                )];
            }
        }
    }

    let cert = params
        .signed_by(&leaf_key, &issuer)
        .map_err(|e| Error::Pki(format!("Leaf certificate signing failed: {e}")))?;

    Ok(Credential::new(leaf_key.serialize_pem(), cert.der().to_vec()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Serial numbers
// ─────────────────────────────────────────────────────────────────────────────

static LAST_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Next certificate serial: issuance wall-clock milliseconds, bumped past the
/// previously issued serial so rapid successive issuance never collides.
fn next_serial() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);

    let mut prev = LAST_SERIAL.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(prev + 1);
        match LAST_SERIAL.compare_exchange_weak(
            prev,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(observed) => prev = observed,
        }
    }
}

/// Validity window: issuance time through issuance + [`VALIDITY_DAYS`].
fn validity_window() -> (OffsetDateTime, OffsetDateTime) {
    let not_before = OffsetDateTime::now_utc();
    (not_before, not_before + Duration::days(VALIDITY_DAYS))
}

// ─────────────────────────────────────────────────────────────────────────────
// DER UTF8String
// ─────────────────────────────────────────────────────────────────────────────

/// DER-encode a UTF8String (tag 0x0C) for the role extension payload.
fn encode_utf8_string(value: &str) -> Result<Vec<u8>> {
    let bytes = value.as_bytes();
    if bytes.len() > usize::from(u16::MAX) {
        return Err(Error::Pki(format!(
            "Role string too long for extension encoding ({} bytes)",
            bytes.len()
        )));
    }

    let mut out = Vec::with_capacity(bytes.len() + 4);
    out.push(0x0c);
    if bytes.len() < 0x80 {
        out.push(u8::try_from(bytes.len()).unwrap_or(0x7f));
    } else if bytes.len() <= 0xff {
        out.push(0x81);
        out.push(u8::try_from(bytes.len()).unwrap_or(0xff));
    } else {
        out.push(0x82);
        out.extend_from_slice(&u16::try_from(bytes.len()).unwrap_or(u16::MAX).to_be_bytes());
    }
    out.extend_from_slice(bytes);
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use x509_parser::certificate::X509Certificate;
    use x509_parser::extensions::ParsedExtension;
    use x509_parser::prelude::FromDer;

    use super::*;

    fn parse(der: &[u8]) -> X509Certificate<'_> {
        X509Certificate::from_der(der).expect("certificate should parse").1
    }

    // ─── root credential ─────────────────────────────────────────────────────

    #[test]
    fn root_is_self_signed_ca() {
        let ca = create_root_credential().unwrap();
        let cert = parse(ca.cert_der());

        assert_eq!(cert.subject().to_string(), cert.issuer().to_string());
        assert!(cert.subject().to_string().contains(CA_COMMON_NAME));
        let constraints = cert
            .basic_constraints()
            .unwrap()
            .expect("CA should carry basic constraints");
        assert!(constraints.value.ca);
    }

    #[test]
    fn root_has_cert_sign_key_usage() {
        let ca = create_root_credential().unwrap();
        let cert = parse(ca.cert_der());

        let key_usage = cert
            .key_usage()
            .unwrap()
            .expect("key usage extension should be present");
        assert!(key_usage.value.key_cert_sign());
        assert!(key_usage.value.crl_sign());
    }

    #[test]
    fn root_generation_produces_unique_keys() {
        let first = create_root_credential().unwrap();
        let second = create_root_credential().unwrap();
        assert_ne!(first.key_pem(), second.key_pem());
    }

    // ─── leaf issuance ───────────────────────────────────────────────────────

    #[test]
    fn leaf_issuer_matches_authority_subject() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Server, None).unwrap();

        let ca_cert = parse(ca.cert_der());
        let leaf_cert = parse(leaf.cert_der());
        assert_eq!(
            leaf_cert.issuer().to_string(),
            ca_cert.subject().to_string()
        );
    }

    #[test]
    fn leaf_is_not_a_ca() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("ReadOnly")).unwrap();
        let cert = parse(leaf.cert_der());
        let constraints = cert
            .basic_constraints()
            .unwrap()
            .expect("leaf should carry explicit basic constraints");
        assert!(!constraints.value.ca);
    }

    #[test]
    fn server_leaf_carries_localhost_san_and_server_auth() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Server, None).unwrap();
        let cert = parse(leaf.cert_der());

        let san = cert
            .subject_alternative_name()
            .unwrap()
            .expect("server leaf should have a SAN");
        let has_localhost = san.value.general_names.iter().any(|name| {
            matches!(
                name,
                x509_parser::extensions::GeneralName::DNSName(dns) if *dns == "localhost"
            )
        });
        assert!(has_localhost);

        let eku = cert
            .extended_key_usage()
            .unwrap()
            .expect("server leaf should have an EKU");
        assert!(eku.value.server_auth);
        assert!(!eku.value.client_auth);
    }

    #[test]
    fn client_leaf_carries_client_auth_and_no_san() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("ReadWrite")).unwrap();
        let cert = parse(leaf.cert_der());

        let eku = cert
            .extended_key_usage()
            .unwrap()
            .expect("client leaf should have an EKU");
        assert!(eku.value.client_auth);
        assert!(!eku.value.server_auth);
        assert!(cert.subject_alternative_name().unwrap().is_none());
    }

    #[test]
    fn authority_key_identifier_binds_leaf_to_ca() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("ReadOnly")).unwrap();

        let ca_cert = parse(ca.cert_der());
        let leaf_cert = parse(leaf.cert_der());

        let ski = ca_cert.extensions().iter().find_map(|ext| {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(ski) => Some(ski.0.to_vec()),
                _ => None,
            }
        });
        let aki = leaf_cert.extensions().iter().find_map(|ext| {
            match ext.parsed_extension() {
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    aki.key_identifier.as_ref().map(|id| id.0.to_vec())
                }
                _ => None,
            }
        });

        assert_eq!(aki.expect("leaf should carry an AKI"), ski.expect("CA should carry an SKI"));
    }

    #[test]
    fn rapid_issuance_never_reuses_serials() {
        let ca = create_root_credential().unwrap();
        let mut serials = HashSet::new();
        for _ in 0..50 {
            let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("ReadOnly")).unwrap();
            let cert = parse(leaf.cert_der());
            assert!(serials.insert(cert.raw_serial().to_vec()), "serial collision");
        }
    }

    // ─── DER UTF8String ──────────────────────────────────────────────────────

    #[test]
    fn utf8_string_short_form() {
        let encoded = encode_utf8_string("ReadOnly").unwrap();
        assert_eq!(encoded[0], 0x0c);
        assert_eq!(encoded[1], 8);
        assert_eq!(&encoded[2..], b"ReadOnly");
    }

    #[test]
    fn utf8_string_long_form_one_byte() {
        let value = "r".repeat(200);
        let encoded = encode_utf8_string(&value).unwrap();
        assert_eq!(&encoded[..3], &[0x0c, 0x81, 200]);
        assert_eq!(encoded.len(), 203);
    }

    #[test]
    fn utf8_string_long_form_two_bytes() {
        let value = "r".repeat(300);
        let encoded = encode_utf8_string(&value).unwrap();
        assert_eq!(&encoded[..4], &[0x0c, 0x82, 0x01, 0x2c]);
    }
}
