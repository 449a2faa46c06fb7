//! A decoded message: an opcode paired with its payload.

use crate::{opcode::Opcode, payload::Payload};

/// An opcode and the payload that goes with it.
///
/// This is the unit the codec produces on decode and consumes on encode; it
/// carries no header fields of its own (`packet_id` is assigned by the
/// [`crate::codec`] at encode time, scoped to the owning connection).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    opcode: Opcode,
    payload: Payload,
}

impl Message {
    /// Builds a message from an opcode and its payload.
    #[must_use]
    pub const fn new(opcode: Opcode, payload: Payload) -> Self {
        Self { opcode, payload }
    }

    /// This message's opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Shared reference to the payload.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable reference to the payload.
    pub const fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Clears this message back to its default state: opcode `Invalid` with
    /// an empty payload.
    ///
    /// Lets a caller reuse one `Message` allocation across many receive
    /// calls instead of constructing a fresh one each time.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for Message {
    /// A default-constructed message has opcode `Invalid` and an empty
    /// payload - the same state [`Message::reset`] returns to.
    fn default() -> Self {
        Self::new(Opcode::Invalid, Payload::new())
    }
}
