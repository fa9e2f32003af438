//! PKI: certificate authority, credential persistence, and role extraction.
//!
//! # Architecture
//!
//! ```text
//! bootstrap
//!   → store::ensure             (load archive, or…)
//!   → authority::create/issue   (…mint a fresh credential)
//!   → codec                     (binary archive + companion PEM files)
//! TLS handshake
//!   → identity::extract_role    (peer certificate DER → Option<role>)
//! ```
//!
//! # Modules
//!
//! - [`authority`] — self-signed root CA and role-tagged leaf issuance
//! - [`codec`] — credential archive and PEM encoding/decoding
//! - [`store`] — idempotent create-if-absent / load-if-present persistence
//! - [`identity`] — peer certificate field and role extraction

pub mod authority;
pub mod codec;
pub mod identity;
pub mod store;

pub use authority::{LeafKind, ROLE_OID, create_root_credential, issue_leaf_credential};
pub use codec::Credential;
pub use identity::{PeerIdentity, extract_role};
