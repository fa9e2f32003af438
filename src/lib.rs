//! Modbus/TCP security gateway.
//!
//! Issues and consumes X.509 certificates that carry a custom role extension,
//! and uses the role bound to each mutual-TLS session to authorize register
//! reads and writes on a Modbus/TCP server.
//!
//! # Architecture
//!
//! ```text
//! startup
//!   → bootstrap          (ensure CA, server, and client credentials on disk)
//!   → server::tls        (rustls configs from the stored credentials)
//!   → ModbusTlsServer    (tokio + tokio-rustls listener)
//! per connection
//!   → TLS handshake      (rustls verifies the peer cert against the CA)
//!   → PeerIdentity       (role extracted once from the peer certificate)
//! per request
//!   → AccessPolicy       (role × operation → verdict, deny by default)
//! ```
//!
//! The role→permission table is fixed at build time: `ReadOnly` may read,
//! `ReadWrite` may read and write, everything else (including no role at all)
//! may do nothing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authz;
pub mod bootstrap;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod pki;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
