//! TLS-secured Modbus/TCP server.
//!
//! # Modules
//!
//! - [`context`] — explicit per-server state ([`ServerContext`])
//! - [`listener`] — accept loop and request dispatch ([`ModbusTlsServer`])
//! - [`process_image`] — holding-register bank ([`ProcessImage`])
//! - [`tls`] — rustls server/client configuration from stored credentials

pub mod context;
pub mod listener;
pub mod process_image;
pub mod tls;

pub use context::ServerContext;
pub use listener::ModbusTlsServer;
pub use process_image::ProcessImage;
