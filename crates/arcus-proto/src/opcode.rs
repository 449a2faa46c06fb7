//! Opcode registry.
//!
//! Distinguishes the two framing-reserved opcodes (used by the connection
//! state machine itself) from the application opcodes carried once a
//! connection is ready.

use crate::error::{ProtocolError, Result};

/// A message's wire opcode.
///
/// `Invalid` is never sent; it is the value a zeroed or corrupted header
/// decodes to and exists so `Opcode::try_from` always has a definite target
/// for value `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Opcode {
    /// Reserved; never sent. Placeholder for the zero byte value.
    Invalid,
    /// Framed handshake acknowledgement. Framing-reserved.
    Hello,
    /// Heartbeat carrying an empty payload. Framing-reserved.
    Health,
    /// Agent asks the game server to stop.
    SoftStop,
    /// Agent tells the game server it has been allocated.
    Allocated,
    /// Agent attaches metadata to the game server.
    Metadata,
    /// Game server replies to `Metadata` with its own metadata.
    ReverseMetadata,
    /// Game server reports information about its host.
    HostInformation,
    /// Game server reports information about this running instance.
    ApplicationInstanceInformation,
    /// Game server reports its liveness status.
    ApplicationInstanceStatus,
    /// Agent asks the game server for its current live state.
    LiveStateRequest,
    /// Game server reports its live state (players, map, mode, ...).
    LiveState,
    /// A custom, implementation-defined command.
    CustomCommand,
}

impl Opcode {
    /// Opcodes that the connection state machine itself consumes.
    ///
    /// These never reach application callbacks - `Hello` drives the
    /// handshake and `Health` drives the [`crate::health`]-adjacent
    /// keepalive channel.
    #[must_use]
    pub const fn is_framing_reserved(self) -> bool {
        matches!(self, Self::Invalid | Self::Hello | Self::Health)
    }

    /// Wire byte for this opcode.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Hello => 1,
            Self::Health => 2,
            Self::SoftStop => 3,
            Self::Allocated => 4,
            Self::Metadata => 5,
            Self::ReverseMetadata => 6,
            Self::HostInformation => 7,
            Self::ApplicationInstanceInformation => 8,
            Self::ApplicationInstanceStatus => 9,
            Self::LiveStateRequest => 10,
            Self::LiveState => 11,
            Self::CustomCommand => 12,
        }
    }

    /// Parses a wire byte into an opcode known to this build.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownOpcode`] for any byte this registry
    /// does not assign.
    pub fn from_u8(byte: u8) -> Result<Self> {
        Ok(match byte {
            0 => Self::Invalid,
            1 => Self::Hello,
            2 => Self::Health,
            3 => Self::SoftStop,
            4 => Self::Allocated,
            5 => Self::Metadata,
            6 => Self::ReverseMetadata,
            7 => Self::HostInformation,
            8 => Self::ApplicationInstanceInformation,
            9 => Self::ApplicationInstanceStatus,
            10 => Self::LiveStateRequest,
            11 => Self::LiveState,
            12 => Self::CustomCommand,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }

    /// Whether this opcode is usable under the given protocol version.
    ///
    /// `Invalid` is never supported under any version - it is never sent on
    /// the wire and exists only as the decode target for a zeroed opcode
    /// byte. Every other opcode defined today is supported as of version 1;
    /// this hook exists so a future version bump has a single place to gate
    /// newer opcodes against older peers.
    #[must_use]
    pub const fn is_supported(self, version: u8) -> bool {
        !matches!(self, Self::Invalid) && version == crate::hello::VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        for byte in 0..=12u8 {
            let op = Opcode::from_u8(byte).expect("known opcode");
            assert_eq!(op.to_u8(), byte);
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        let err = Opcode::from_u8(255).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownOpcode(255)));
    }

    #[test]
    fn framing_reserved_set() {
        assert!(Opcode::Hello.is_framing_reserved());
        assert!(Opcode::Health.is_framing_reserved());
        assert!(Opcode::Invalid.is_framing_reserved());
        assert!(!Opcode::LiveState.is_framing_reserved());
    }
}
