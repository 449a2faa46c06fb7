//! The 10-byte framed message header.
//!
//! Layout, all fields little-endian on the wire regardless of host
//! endianness:
//!
//! ```text
//! byte 0     flags      (reserved, must be 0)
//! byte 1     opcode
//! bytes 2-5  packet_id  (u32, LE)
//! bytes 6-9  length     (u32, LE) - payload length in bytes
//! ```

use crate::{
    error::{ProtocolError, Result},
    opcode::Opcode,
};

/// Size in bytes of an encoded [`Header`].
pub const SIZE: usize = 10;

/// Maximum payload size this build will encode or accept.
///
/// The wire format places no ceiling on `length` other than `u32::MAX`; this
/// is an implementation choice, enforced identically by the encoder and the
/// decoder so two builds of this crate always agree on what is too large.
pub const PAYLOAD_MAX: usize = 1024;

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    opcode: Opcode,
    packet_id: u32,
    length: u32,
}

impl Header {
    /// Builds a header for a message carrying `length` bytes of payload.
    #[must_use]
    pub const fn new(opcode: Opcode, packet_id: u32, length: u32) -> Self {
        Self { opcode, packet_id, length }
    }

    /// The message's opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The connection-scoped packet sequence number.
    #[must_use]
    pub const fn packet_id(&self) -> u32 {
        self.packet_id
    }

    /// Declared payload length in bytes.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Encodes this header to its fixed 10-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; SIZE] {
        let mut out = [0u8; SIZE];
        out[0] = 0; // flags, always zero
        out[1] = self.opcode.to_u8();
        out[2..6].copy_from_slice(&self.packet_id.to_le_bytes());
        out[6..10].copy_from_slice(&self.length.to_le_bytes());
        out
    }

    /// Parses a header from exactly [`SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::HeaderTooShort`] if fewer than [`SIZE`] bytes are
    ///   available.
    /// - [`ProtocolError::NonZeroReserved`] if the flags byte is non-zero.
    /// - [`ProtocolError::UnknownOpcode`] if the opcode byte is unrecognized.
    /// - [`ProtocolError::UnsupportedOpcode`] if the opcode is recognized but
    ///   not supported under this build's protocol version.
    /// - [`ProtocolError::PayloadTooLarge`] if `length` exceeds
    ///   [`PAYLOAD_MAX`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SIZE {
            return Err(ProtocolError::HeaderTooShort { len: bytes.len(), expected: SIZE });
        }
        let flags = bytes[0];
        if flags != 0 {
            return Err(ProtocolError::NonZeroReserved { field: "flags", value: u32::from(flags) });
        }
        let opcode = Opcode::from_u8(bytes[1])?;
        if !opcode.is_supported(crate::hello::VERSION) {
            return Err(ProtocolError::UnsupportedOpcode(opcode));
        }
        let mut packet_id_bytes = [0u8; 4];
        packet_id_bytes.copy_from_slice(&bytes[2..6]);
        let packet_id = u32::from_le_bytes(packet_id_bytes);
        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&bytes[6..10]);
        let length = u32::from_le_bytes(length_bytes);
        if length as usize > PAYLOAD_MAX {
            return Err(ProtocolError::PayloadTooLarge {
                len: length as usize,
                max: PAYLOAD_MAX,
            });
        }
        Ok(Self { opcode, packet_id, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let header = Header::new(Opcode::LiveState, 7, 42);
        let bytes = header.encode();
        assert_eq!(bytes.len(), SIZE);
        let decoded = Header::decode(&bytes).expect("valid header");
        assert_eq!(decoded, header);
    }

    #[test]
    fn wire_bytes_are_little_endian() {
        let header = Header::new(Opcode::Hello, 0x0102_0304, 0x0506_0708);
        let bytes = header.encode();
        assert_eq!(&bytes[2..6], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[6..10], &[0x08, 0x07, 0x06, 0x05]);
    }

    #[test]
    fn rejects_short_buffer() {
        let err = Header::decode(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtocolError::HeaderTooShort { .. }));
    }

    #[test]
    fn rejects_nonzero_flags() {
        let mut bytes = Header::new(Opcode::Hello, 0, 0).encode();
        bytes[0] = 1;
        let err = Header::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::NonZeroReserved { .. }));
    }

    #[test]
    fn rejects_oversized_length() {
        let mut bytes = Header::new(Opcode::Hello, 0, 0).encode();
        bytes[6..10].copy_from_slice(&((PAYLOAD_MAX as u32) + 1).to_le_bytes());
        let err = Header::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { .. }));
    }

    #[test]
    fn rejects_invalid_opcode_byte() {
        let bytes = [0u8; SIZE];
        let err = Header::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedOpcode(Opcode::Invalid)));
    }
}
