//! Modbus/TCP security client.
//!
//! One session per connected [`ModbusTlsClient`]; the role the server sees is
//! fixed by the credential presented at connect time. Exception responses are
//! surfaced as [`Error::Exception`] — a denied request and an unsupported one
//! are indistinguishable here, mirroring the server's wire behavior.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::protocol::frame::{self, Frame};
use crate::protocol::pdu::{Request, Response};
use crate::{Error, Result};

/// A connected Modbus security client session.
pub struct ModbusTlsClient {
    stream: TlsStream<TcpStream>,
    transaction_id: u16,
}

impl ModbusTlsClient {
    /// Connect to `host:port`, verifying the server against the CA in `tls`
    /// and presenting the client credential it carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the TCP connect fails and [`Error::Tls`] if
    /// the handshake fails or `host` is not a valid server name.
    pub async fn connect(host: &str, port: u16, tls: Arc<rustls::ClientConfig>) -> Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| Error::Tls(format!("Invalid server name '{host}': {e}")))?;
        let stream = TlsConnector::from(tls)
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::Tls(format!("TLS handshake failed: {e}")))?;

        debug!(host, port, "Connected");
        Ok(Self {
            stream,
            transaction_id: 0,
        })
    }

    /// Read Holding Registers (0x03).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exception`] if the server rejects the request (denied
    /// or invalid), and transport/protocol errors otherwise.
    pub async fn read_holding_registers(
        &mut self,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>> {
        let response = self
            .transact(unit_id, Request::ReadHoldingRegisters { address, quantity })
            .await?;
        match response {
            Response::ReadHoldingRegisters { registers } => Ok(registers),
            other => Err(unexpected(&other)),
        }
    }

    /// Write Single Register (0x06).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exception`] if the server rejects the request (denied
    /// or invalid), and transport/protocol errors otherwise.
    pub async fn write_single_register(
        &mut self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<()> {
        let response = self
            .transact(unit_id, Request::WriteSingleRegister { address, value })
            .await?;
        match response {
            Response::WriteSingleRegister { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Send one request and read its matching response.
    async fn transact(&mut self, unit_id: u8, request: Request) -> Result<Response> {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        let frame = Frame::new(self.transaction_id, unit_id, request.encode());
        frame::write_frame(&mut self.stream, &frame).await?;

        let reply = frame::read_frame(&mut self.stream).await?;
        if reply.transaction_id != frame.transaction_id {
            return Err(Error::Protocol(format!(
                "transaction id mismatch: sent {}, got {}",
                frame.transaction_id, reply.transaction_id
            )));
        }

        let response = Response::decode(&reply.pdu)?;
        if let Response::Exception { function, code } = response {
            return Err(Error::Exception {
                function,
                code: code.as_u8(),
            });
        }
        Ok(response)
    }
}

fn unexpected(response: &Response) -> Error {
    Error::Protocol(format!("unexpected response: {response:?}"))
}
