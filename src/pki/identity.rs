//! Peer certificate identity and role extraction.
//!
//! Extraction is total: any absent, unparseable, or malformed input yields
//! "no role" rather than an error. Vocabulary validation is not done here —
//! the decision engine ([`crate::authz`]) treats unknown roles as the empty
//! permission set, so a bogus role and a missing role are indistinguishable
//! downstream.
//!
//! Everything operates on raw certificate DER bytes, keeping the decision
//! engine free of any TLS-library certificate representation.

use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

/// Dotted-string form of [`crate::pki::authority::ROLE_OID`], used to match
/// parsed extensions.
pub const ROLE_OID_DOTTED: &str = "1.3.6.1.4.1.50316.802.1";

// ─────────────────────────────────────────────────────────────────────────────
// Peer identity
// ─────────────────────────────────────────────────────────────────────────────

/// Identity facts resolved once per connection from the peer certificate.
///
/// Both fields are `None` for unauthenticated peers or unparseable
/// certificates; such peers hold no role and are denied everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Certificate Common Name (CN), for logs.
    pub common_name: Option<String>,
    /// Role carried in the role extension, if any.
    pub role: Option<String>,
}

impl PeerIdentity {
    /// Extract identity fields from a DER-encoded certificate.
    ///
    /// Total: an unparseable certificate yields the default (empty) identity.
    #[must_use]
    pub fn from_der(der: &[u8]) -> Self {
        let Ok((_, cert)) = X509Certificate::from_der(der) else {
            return Self::default();
        };
        Self {
            common_name: extract_cn(&cert),
            role: role_from_cert(&cert),
        }
    }

    /// Human-readable label for logs.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.common_name.as_deref().unwrap_or("<unknown>")
    }
}

/// Extract the role string from a DER-encoded certificate, if present.
#[must_use]
pub fn extract_role(der: &[u8]) -> Option<String> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;
    role_from_cert(&cert)
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction helpers
// ─────────────────────────────────────────────────────────────────────────────

fn extract_cn(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
}

fn role_from_cert(cert: &X509Certificate<'_>) -> Option<String> {
    let ext = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == ROLE_OID_DOTTED)?;
    decode_utf8_string(ext.value)
}

/// Decode a DER UTF8String (tag 0x0C). `None` on any malformation: wrong tag,
/// bad length encoding, trailing bytes, or invalid UTF-8.
fn decode_utf8_string(raw: &[u8]) -> Option<String> {
    let (&tag, rest) = raw.split_first()?;
    if tag != 0x0c {
        return None;
    }

    let (&first_len, rest) = rest.split_first()?;
    let (len, rest) = if first_len < 0x80 {
        (usize::from(first_len), rest)
    } else {
        let octets = usize::from(first_len & 0x7f);
        if octets == 0 || octets > 2 || rest.len() < octets {
            return None;
        }
        let mut len = 0usize;
        for &byte in &rest[..octets] {
            len = (len << 8) | usize::from(byte);
        }
        (len, &rest[octets..])
    };

    if rest.len() != len {
        return None;
    }
    String::from_utf8(rest.to_vec()).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::authority::{
        self, CLIENT_COMMON_NAME, LeafKind, create_root_credential, issue_leaf_credential,
    };

    // ─── role round-trips ────────────────────────────────────────────────────

    #[test]
    fn client_leaf_role_round_trips() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("ReadWrite")).unwrap();
        assert_eq!(extract_role(leaf.cert_der()).as_deref(), Some("ReadWrite"));
    }

    #[test]
    fn server_leaf_has_no_role() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Server, None).unwrap();
        assert_eq!(extract_role(leaf.cert_der()), None);
    }

    #[test]
    fn roleless_client_leaf_has_no_role() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, None).unwrap();
        assert_eq!(extract_role(leaf.cert_der()), None);
    }

    #[test]
    fn ca_certificate_has_no_role() {
        let ca = create_root_credential().unwrap();
        assert_eq!(extract_role(ca.cert_der()), None);
    }

    #[test]
    fn unknown_role_string_is_returned_verbatim() {
        // vocabulary validation belongs to the decision engine, not here
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("Auditor")).unwrap();
        assert_eq!(extract_role(leaf.cert_der()).as_deref(), Some("Auditor"));
    }

    #[test]
    fn long_role_round_trips_through_long_form_length() {
        let ca = create_root_credential().unwrap();
        let role = "R".repeat(200);
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some(&role)).unwrap();
        assert_eq!(extract_role(leaf.cert_der()).as_deref(), Some(role.as_str()));
    }

    // ─── total extraction ────────────────────────────────────────────────────

    #[test]
    fn garbage_der_yields_no_role() {
        assert_eq!(extract_role(b"not a certificate"), None);
        assert_eq!(PeerIdentity::from_der(b"not a certificate"), PeerIdentity::default());
    }

    // ─── peer identity ───────────────────────────────────────────────────────

    #[test]
    fn peer_identity_carries_cn_and_role() {
        let ca = create_root_credential().unwrap();
        let leaf = issue_leaf_credential(&ca, LeafKind::Client, Some("ReadOnly")).unwrap();

        let identity = PeerIdentity::from_der(leaf.cert_der());
        assert_eq!(identity.common_name.as_deref(), Some(CLIENT_COMMON_NAME));
        assert_eq!(identity.role.as_deref(), Some("ReadOnly"));
        assert_eq!(identity.display_name(), CLIENT_COMMON_NAME);
    }

    #[test]
    fn default_identity_displays_as_unknown() {
        assert_eq!(PeerIdentity::default().display_name(), "<unknown>");
    }

    // ─── UTF8String decoding ─────────────────────────────────────────────────

    #[test]
    fn utf8_decode_rejects_wrong_tag() {
        // 0x13 is PrintableString
        assert_eq!(decode_utf8_string(&[0x13, 0x02, b'h', b'i']), None);
    }

    #[test]
    fn utf8_decode_rejects_length_mismatch() {
        assert_eq!(decode_utf8_string(&[0x0c, 0x05, b'h', b'i']), None);
        assert_eq!(decode_utf8_string(&[0x0c, 0x01, b'h', b'i']), None);
    }

    #[test]
    fn utf8_decode_rejects_invalid_utf8() {
        assert_eq!(decode_utf8_string(&[0x0c, 0x02, 0xff, 0xfe]), None);
    }

    #[test]
    fn utf8_decode_accepts_short_form() {
        assert_eq!(
            decode_utf8_string(&[0x0c, 0x08, b'R', b'e', b'a', b'd', b'O', b'n', b'l', b'y'])
                .as_deref(),
            Some("ReadOnly")
        );
    }

    #[test]
    fn dotted_oid_matches_component_form() {
        let dotted = authority::ROLE_OID
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        assert_eq!(dotted, ROLE_OID_DOTTED);
    }
}
