//! TLS listener and per-connection request dispatch.
//!
//! Each accepted connection is handshaken, its peer identity (and role)
//! resolved once, and then served on its own task. The role is fixed for the
//! lifetime of one TLS session; every request on the session is authorized
//! individually against it.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

use crate::authz::{Operation, Verdict};
use crate::pki::PeerIdentity;
use crate::protocol::frame::{self, Frame};
use crate::protocol::pdu::{
    ExceptionCode, FN_READ_HOLDING_REGISTERS, FN_WRITE_SINGLE_REGISTER, MAX_READ_QUANTITY,
    Request, Response,
};
use crate::server::context::ServerContext;
use crate::{Error, Result};

/// Total number of holding-register addresses.
const ADDRESS_SPACE: u32 = 65536;

/// A bound, ready-to-serve Modbus security server.
pub struct ModbusTlsServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    context: Arc<ServerContext>,
}

impl ModbusTlsServer {
    /// Bind the TCP listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        tls: Arc<rustls::ServerConfig>,
        context: Arc<ServerContext>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(tls),
            context,
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the owning task is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if accepting fails. Per-connection errors are
    /// logged and do not stop the listener.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "Modbus security server listening");
        loop {
            let (stream, peer_addr) = self.listener.accept().await?;
            let acceptor = self.acceptor.clone();
            let context = Arc::clone(&self.context);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(acceptor, stream, peer_addr, context).await {
                    debug!(peer = %peer_addr, error = %e, "Connection ended with error");
                }
            });
        }
    }
}

/// Handshake, resolve the peer identity, and run the request loop.
async fn serve_connection(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    peer_addr: SocketAddr,
    context: Arc<ServerContext>,
) -> Result<()> {
    let tls_stream = acceptor
        .accept(stream)
        .await
        .map_err(|e| Error::Tls(format!("Handshake with {peer_addr} failed: {e}")))?;

    // Resolved once per connection; no certificate means no role.
    let identity = {
        let (_, connection) = tls_stream.get_ref();
        connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .map(|cert| PeerIdentity::from_der(cert.as_ref()))
            .unwrap_or_default()
    };

    info!(
        peer = %peer_addr,
        identity = identity.display_name(),
        role = identity.role.as_deref().unwrap_or("<none>"),
        "Connection established"
    );

    let result = request_loop(tls_stream, &identity, &context).await;

    info!(peer = %peer_addr, "Connection closed");
    result
}

/// Serve frames until the peer hangs up.
async fn request_loop<S>(
    mut stream: S,
    identity: &PeerIdentity,
    context: &ServerContext,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let request = match frame::read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        let response = dispatch(&request.pdu, identity, context);
        let reply = Frame::new(request.transaction_id, request.unit_id, response.encode());
        frame::write_frame(&mut stream, &reply).await?;
    }
}

/// Decode, authorize, and execute one request PDU.
///
/// Authorization verdicts become protocol errors only here, at the wire
/// boundary: a denied request is answered with Illegal Function, exactly like
/// an unsupported one, so the wire leaks nothing about valid roles.
fn dispatch(pdu: &[u8], identity: &PeerIdentity, context: &ServerContext) -> Response {
    let Some(&function) = pdu.first() else {
        return Response::exception(0, ExceptionCode::IllegalFunction);
    };

    let request = match Request::decode(pdu) {
        Ok(request) => request,
        Err(_) => {
            let code = if matches!(function, FN_READ_HOLDING_REGISTERS | FN_WRITE_SINGLE_REGISTER)
            {
                ExceptionCode::IllegalDataValue
            } else {
                ExceptionCode::IllegalFunction
            };
            return Response::exception(function, code);
        }
    };

    let operation = match request {
        Request::ReadHoldingRegisters { .. } => Operation::Read,
        Request::WriteSingleRegister { .. } => Operation::Write,
    };
    if context.policy.authorize(operation, identity.role.as_deref()) == Verdict::NotAuthorized {
        return Response::exception(function, ExceptionCode::IllegalFunction);
    }

    match request {
        Request::ReadHoldingRegisters { address, quantity } => {
            if quantity == 0 || quantity > MAX_READ_QUANTITY {
                return Response::exception(function, ExceptionCode::IllegalDataValue);
            }
            if u32::from(address) + u32::from(quantity) > ADDRESS_SPACE {
                return Response::exception(function, ExceptionCode::IllegalDataAddress);
            }
            Response::ReadHoldingRegisters {
                registers: context.process_image.read_holding(address, quantity),
            }
        }
        Request::WriteSingleRegister { address, value } => {
            context.process_image.write_holding(address, value);
            Response::WriteSingleRegister { address, value }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
