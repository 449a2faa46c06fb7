//! Protocol-level error types.

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
///
/// These are pure parsing/validation errors - they carry no knowledge of
/// sockets, timers, or connection state. A [`ProtocolError`] always means the
/// bytes on the wire (or the value being encoded) violated the format, never
/// a transient condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer was too short to contain a complete header.
    #[error("buffer of {len} bytes is smaller than the {expected}-byte header")]
    HeaderTooShort {
        /// Bytes actually available.
        len: usize,
        /// Bytes required for a full header.
        expected: usize,
    },

    /// The declared payload length exceeds the configured maximum.
    #[error("payload length {len} exceeds the maximum of {max} bytes")]
    PayloadTooLarge {
        /// Declared payload length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The buffer does not yet contain the full frame (header + payload).
    ///
    /// Callers decoding from a streaming buffer should treat this as "wait
    /// for more bytes", not as a fatal error.
    #[error("buffer holds {have} of {needed} bytes needed for the full frame")]
    Incomplete {
        /// Bytes currently available.
        have: usize,
        /// Bytes required to complete the frame.
        needed: usize,
    },

    /// A header field that must be zero (reserved, or flags) was non-zero.
    #[error("header field '{field}' must be zero, got {value:#x}")]
    NonZeroReserved {
        /// Name of the offending field.
        field: &'static str,
        /// Value observed.
        value: u32,
    },

    /// The Hello packet's magic bytes did not match.
    #[error("hello magic mismatch: expected {expected:?}, got {actual:?}")]
    BadHelloMagic {
        /// Expected magic bytes.
        expected: [u8; 4],
        /// Bytes actually received.
        actual: [u8; 4],
    },

    /// The protocol version in a Hello packet or header is unsupported.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// The opcode is not recognized by this build's registry.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// The opcode is recognized but not valid in the direction it appeared.
    #[error("opcode {0:?} is not valid for this role/direction")]
    UnsupportedOpcode(crate::opcode::Opcode),

    /// JSON payload failed to parse, or failed to serialize.
    #[error("payload JSON error: {0}")]
    Json(String),

    /// A typed accessor was used against a value of a different DOM kind.
    #[error("field '{field}' is {actual}, not {expected}")]
    TypeMismatch {
        /// Field name (or `"<root>"` for the top-level payload).
        field: String,
        /// Kind that was requested.
        expected: &'static str,
        /// Kind actually stored.
        actual: &'static str,
    },

    /// A required field was absent from a payload.
    #[error("missing required field '{0}'")]
    MissingField(String),
}

/// Convenience alias for results carrying a [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;
