//! The fixed 6-byte Hello packet exchanged before any framed traffic.
//!
//! Hello is sent raw - it is not wrapped in a [`crate::header::Header`] and
//! carries no payload. Either side that receives bytes which do not match
//! this exact shape must treat the connection as broken.

use crate::error::{ProtocolError, Result};

/// Magic bytes identifying an Arcus Hello packet: `"arc\0"`.
pub const MAGIC: [u8; 4] = *b"arc\0";

/// Current protocol version.
pub const VERSION: u8 = 1;

/// Size in bytes of an encoded Hello packet.
pub const SIZE: usize = 6;

/// The handshake greeting: magic, version, and a reserved byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    version: u8,
}

impl Hello {
    /// Builds the Hello this build of the protocol sends.
    #[must_use]
    pub const fn current() -> Self {
        Self { version: VERSION }
    }

    /// Protocol version carried by this Hello.
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Encodes this Hello to its fixed 6-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; SIZE] {
        let mut out = [0u8; SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.version;
        out[5] = 0;
        out
    }

    /// Parses a Hello from exactly [`SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::HeaderTooShort`] if fewer than [`SIZE`] bytes
    /// are given, [`ProtocolError::BadHelloMagic`] if the magic does not
    /// match, [`ProtocolError::UnsupportedVersion`] if the version is not one
    /// this build understands, and [`ProtocolError::NonZeroReserved`] if the
    /// trailing reserved byte is anything but zero - every byte of a Hello is
    /// load-bearing, including the one with no meaning yet.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SIZE {
            return Err(ProtocolError::HeaderTooShort { len: bytes.len(), expected: SIZE });
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(ProtocolError::BadHelloMagic { expected: MAGIC, actual: magic });
        }
        let version = bytes[4];
        if version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        if bytes[5] != 0 {
            return Err(ProtocolError::NonZeroReserved {
                field: "hello_reserved",
                value: u32::from(bytes[5]),
            });
        }
        Ok(Self { version })
    }
}
