//! Error types for the Modbus security gateway.

use std::io;

use thiserror::Error;

/// Result type alias for the gateway.
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Certificate generation or signing failure
    #[error("PKI error: {0}")]
    Pki(String),

    /// Credential store failure (corrupt archive, unwritable directory, ...)
    #[error("Credential store error: {0}")]
    Store(String),

    /// TLS configuration or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Modbus framing or PDU violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Modbus exception response returned by the peer
    #[error("Modbus exception: function 0x{function:02x}, code 0x{code:02x}")]
    Exception {
        /// Function code of the rejected request.
        function: u8,
        /// Modbus exception code.
        code: u8,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
