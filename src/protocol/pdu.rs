//! Register-access PDUs: Read Holding Registers and Write Single Register.

use bytes::{Buf, BufMut, BytesMut};

use crate::{Error, Result};

/// Read Holding Registers function code.
pub const FN_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Write Single Register function code.
pub const FN_WRITE_SINGLE_REGISTER: u8 = 0x06;
/// Flag or'ed onto the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Most registers a single read may request.
pub const MAX_READ_QUANTITY: u16 = 125;

// ─────────────────────────────────────────────────────────────────────────────
// Exception codes
// ─────────────────────────────────────────────────────────────────────────────

/// Modbus exception codes used by this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// Function not supported — also the wire form of a denied request.
    IllegalFunction,
    /// Register range outside the addressable space.
    IllegalDataAddress,
    /// Malformed or out-of-range request field.
    IllegalDataValue,
    /// Unrecoverable server-side failure.
    ServerDeviceFailure,
    /// A code outside the set above.
    Other(u8),
}

impl ExceptionCode {
    /// Wire value of this code.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::Other(code) => code,
        }
    }

    /// Decode a wire value.
    #[must_use]
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            other => Self::Other(other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded request PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read Holding Registers (0x03).
    ReadHoldingRegisters {
        /// First register address.
        address: u16,
        /// Number of registers to read.
        quantity: u16,
    },
    /// Write Single Register (0x06).
    WriteSingleRegister {
        /// Register address.
        address: u16,
        /// Value to write.
        value: u16,
    },
}

impl Request {
    /// Function code of this request.
    #[must_use]
    pub fn function(&self) -> u8 {
        match self {
            Self::ReadHoldingRegisters { .. } => FN_READ_HOLDING_REGISTERS,
            Self::WriteSingleRegister { .. } => FN_WRITE_SINGLE_REGISTER,
        }
    }

    /// Encode to PDU bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u8(self.function());
        match *self {
            Self::ReadHoldingRegisters { address, quantity } => {
                buf.put_u16(address);
                buf.put_u16(quantity);
            }
            Self::WriteSingleRegister { address, value } => {
                buf.put_u16(address);
                buf.put_u16(value);
            }
        }
        buf.to_vec()
    }

    /// Decode a request PDU.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for an empty PDU, an unsupported function
    /// code, or a payload of the wrong size.
    pub fn decode(pdu: &[u8]) -> Result<Self> {
        let Some((&function, payload)) = pdu.split_first() else {
            return Err(Error::Protocol("empty request PDU".to_string()));
        };
        let mut buf = payload;
        match function {
            FN_READ_HOLDING_REGISTERS => {
                if buf.len() != 4 {
                    return Err(Error::Protocol(format!(
                        "Read Holding Registers payload of {} bytes, expected 4",
                        buf.len()
                    )));
                }
                Ok(Self::ReadHoldingRegisters {
                    address: buf.get_u16(),
                    quantity: buf.get_u16(),
                })
            }
            FN_WRITE_SINGLE_REGISTER => {
                if buf.len() != 4 {
                    return Err(Error::Protocol(format!(
                        "Write Single Register payload of {} bytes, expected 4",
                        buf.len()
                    )));
                }
                Ok(Self::WriteSingleRegister {
                    address: buf.get_u16(),
                    value: buf.get_u16(),
                })
            }
            other => Err(Error::Protocol(format!(
                "unsupported function code 0x{other:02x}"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// A response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Registers returned by a read.
    ReadHoldingRegisters {
        /// Register values, in address order.
        registers: Vec<u16>,
    },
    /// Echo of a successful single-register write.
    WriteSingleRegister {
        /// Register address.
        address: u16,
        /// Value written.
        value: u16,
    },
    /// Exception response.
    Exception {
        /// Function code of the rejected request.
        function: u8,
        /// Exception code.
        code: ExceptionCode,
    },
}

impl Response {
    /// Build an exception response for `function`.
    #[must_use]
    pub fn exception(function: u8, code: ExceptionCode) -> Self {
        Self::Exception { function, code }
    }

    /// Encode to PDU bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::ReadHoldingRegisters { registers } => {
                let mut buf = BytesMut::with_capacity(2 + registers.len() * 2);
                buf.put_u8(FN_READ_HOLDING_REGISTERS);
                buf.put_u8(u8::try_from(registers.len() * 2).unwrap_or(u8::MAX));
                for &register in registers {
                    buf.put_u16(register);
                }
                buf.to_vec()
            }
            Self::WriteSingleRegister { address, value } => {
                let mut buf = BytesMut::with_capacity(5);
                buf.put_u8(FN_WRITE_SINGLE_REGISTER);
                buf.put_u16(*address);
                buf.put_u16(*value);
                buf.to_vec()
            }
            Self::Exception { function, code } => {
                vec![function | EXCEPTION_FLAG, code.as_u8()]
            }
        }
    }

    /// Decode a response PDU.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for an empty PDU, an unknown function
    /// code, or a payload inconsistent with its length fields.
    pub fn decode(pdu: &[u8]) -> Result<Self> {
        let Some((&function, payload)) = pdu.split_first() else {
            return Err(Error::Protocol("empty response PDU".to_string()));
        };

        if function & EXCEPTION_FLAG != 0 {
            let Some(&code) = payload.first() else {
                return Err(Error::Protocol("exception response without code".to_string()));
            };
            return Ok(Self::Exception {
                function: function & !EXCEPTION_FLAG,
                code: ExceptionCode::from_u8(code),
            });
        }

        let mut buf = payload;
        match function {
            FN_READ_HOLDING_REGISTERS => {
                let Some((&byte_count, mut rest)) = payload.split_first() else {
                    return Err(Error::Protocol("read response without byte count".to_string()));
                };
                let byte_count = usize::from(byte_count);
                if byte_count % 2 != 0 || rest.len() != byte_count {
                    return Err(Error::Protocol(format!(
                        "read response byte count {byte_count} does not match payload of {} bytes",
                        rest.len()
                    )));
                }
                let mut registers = Vec::with_capacity(byte_count / 2);
                while rest.has_remaining() {
                    registers.push(rest.get_u16());
                }
                Ok(Self::ReadHoldingRegisters { registers })
            }
            FN_WRITE_SINGLE_REGISTER => {
                if buf.len() != 4 {
                    return Err(Error::Protocol(format!(
                        "write response payload of {} bytes, expected 4",
                        buf.len()
                    )));
                }
                Ok(Self::WriteSingleRegister {
                    address: buf.get_u16(),
                    value: buf.get_u16(),
                })
            }
            other => Err(Error::Protocol(format!(
                "unknown response function code 0x{other:02x}"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
