//! MBAP framing for Modbus/TCP.
//!
//! An application data unit is a 7-byte MBAP header (transaction id,
//! protocol id, length, unit id) followed by the raw PDU bytes. The length
//! field counts the unit id plus the PDU.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// MBAP header length on the wire.
pub const MBAP_HEADER_LEN: usize = 7;

/// Largest PDU this implementation will frame.
pub const MAX_PDU_LEN: usize = 253;

/// A Modbus/TCP application data unit: MBAP header plus raw PDU bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Transaction identifier, echoed by responses.
    pub transaction_id: u16,
    /// Addressed unit identifier.
    pub unit_id: u8,
    /// Raw PDU bytes (function code + payload).
    pub pdu: Vec<u8>,
}

impl Frame {
    /// Assemble a frame.
    #[must_use]
    pub fn new(transaction_id: u16, unit_id: u8, pdu: Vec<u8>) -> Self {
        Self {
            transaction_id,
            unit_id,
            pdu,
        }
    }
}

/// Read one frame.
///
/// # Errors
///
/// Returns [`Error::Io`] on read failure (including EOF mid-frame) and
/// [`Error::Protocol`] on a malformed MBAP header.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; MBAP_HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let mut buf = &header[..];
    let transaction_id = buf.get_u16();
    let protocol_id = buf.get_u16();
    let length = usize::from(buf.get_u16());
    let unit_id = buf.get_u8();

    if protocol_id != 0 {
        return Err(Error::Protocol(format!(
            "unexpected MBAP protocol id {protocol_id}"
        )));
    }
    if length < 2 || length - 1 > MAX_PDU_LEN {
        return Err(Error::Protocol(format!(
            "MBAP length {length} out of range"
        )));
    }

    let mut pdu = vec![0u8; length - 1];
    reader.read_exact(&mut pdu).await?;

    Ok(Frame {
        transaction_id,
        unit_id,
        pdu,
    })
}

/// Write one frame.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the PDU exceeds [`MAX_PDU_LEN`] and
/// [`Error::Io`] on write failure.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if frame.pdu.len() > MAX_PDU_LEN {
        return Err(Error::Protocol(format!(
            "PDU of {} bytes exceeds maximum of {MAX_PDU_LEN}",
            frame.pdu.len()
        )));
    }
    let length = u16::try_from(frame.pdu.len() + 1)
        .map_err(|_| Error::Protocol("PDU too large to frame".to_string()))?;

    let mut buf = BytesMut::with_capacity(MBAP_HEADER_LEN + frame.pdu.len());
    buf.put_u16(frame.transaction_id);
    buf.put_u16(0); // protocol id: always zero for Modbus
    buf.put_u16(length);
    buf.put_u8(frame.unit_id);
    buf.put_slice(&frame.pdu);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn frame_round_trips() {
        let frame = Frame::new(0x1234, 1, vec![0x03, 0x00, 0x10, 0x00, 0x02]);

        let mut wire = Vec::new();
        write_frame(&mut wire, &frame).await.unwrap();
        let decoded = read_frame(&mut wire.as_slice()).await.unwrap();

        assert_eq!(decoded, frame);
    }

    #[tokio::test]
    async fn wire_layout_matches_mbap() {
        let frame = Frame::new(0x0102, 0x11, vec![0x03, 0xaa]);

        let mut wire = Vec::new();
        write_frame(&mut wire, &frame).await.unwrap();

        assert_eq!(
            wire,
            vec![0x01, 0x02, 0x00, 0x00, 0x00, 0x03, 0x11, 0x03, 0xaa]
        );
    }

    #[tokio::test]
    async fn nonzero_protocol_id_is_rejected() {
        let wire = [0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0x01, 0x03];
        let err = read_frame(&mut wire.as_slice()).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn zero_length_is_rejected() {
        let wire = [0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01];
        let err = read_frame(&mut wire.as_slice()).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_frame_is_an_io_error() {
        // header promises a 4-byte PDU, only 1 byte follows
        let wire = [0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03];
        let err = read_frame(&mut wire.as_slice()).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn oversized_pdu_is_rejected_on_write() {
        let frame = Frame::new(1, 1, vec![0u8; MAX_PDU_LEN + 1]);
        let mut wire = Vec::new();
        let err = write_frame(&mut wire, &frame).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn consecutive_frames_parse_in_order() {
        let first = Frame::new(1, 1, vec![0x03, 0x01]);
        let second = Frame::new(2, 1, vec![0x06, 0x02]);

        let mut wire = Vec::new();
        write_frame(&mut wire, &first).await.unwrap();
        write_frame(&mut wire, &second).await.unwrap();

        let mut cursor = wire.as_slice();
        assert_eq!(read_frame(&mut cursor).await.unwrap(), first);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), second);
    }
}
