//! Modbus/TCP wire protocol: MBAP framing and register-access PDUs.
//!
//! Only the two operations the gateway authorizes are implemented:
//! Read Holding Registers (0x03) and Write Single Register (0x06). Any other
//! function code is answered with an Illegal Function exception by the
//! server, which is also how denied requests surface on the wire — a client
//! cannot tell an unsupported function from a forbidden one.

pub mod frame;
pub mod pdu;
