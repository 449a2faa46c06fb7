//! Per-opcode payload schemas.
//!
//! A message's opcode fixes the shape its payload must have. These
//! functions are the single enforcement point both `arcus-server` and
//! `arcus-client` validate against: outgoing messages before they are
//! enqueued, incoming messages before a callback is invoked. They reuse
//! [`Payload`]'s own typed, non-coercing accessors - a schema check is
//! nothing more than reading every mandatory field with the accessor that
//! matches its declared kind and propagating whatever error comes back.

use crate::{error::Result, opcode::Opcode, payload::Payload};

/// Checks `payload` against the mandatory fields for `opcode`.
///
/// `Hello` and `Health` carry no payload and always pass. Opcodes with no
/// mandatory fields pass trivially too, since there is nothing to violate.
///
/// # Errors
///
/// Whatever the first missing or mismatched field's accessor returns:
/// [`crate::error::ProtocolError::MissingField`] or
/// [`crate::error::ProtocolError::TypeMismatch`].
pub fn validate(opcode: Opcode, payload: &Payload) -> Result<()> {
    match opcode {
        Opcode::Invalid | Opcode::Hello | Opcode::Health => Ok(()),
        Opcode::SoftStop => {
            payload.int_val("timeout")?;
            Ok(())
        },
        Opcode::Allocated | Opcode::Metadata | Opcode::ReverseMetadata | Opcode::CustomCommand => {
            payload.array_val("data")?;
            Ok(())
        },
        Opcode::HostInformation => {
            payload.object_val("hostInformation")?;
            Ok(())
        },
        Opcode::ApplicationInstanceInformation => {
            payload.object_val("applicationInstanceInformation")?;
            Ok(())
        },
        Opcode::ApplicationInstanceStatus => {
            payload.int_val("status")?;
            Ok(())
        },
        Opcode::LiveStateRequest => Ok(()),
        Opcode::LiveState => {
            payload.int_val("players")?;
            payload.int_val("maxPlayers")?;
            payload.string_val("name")?;
            payload.string_val("map")?;
            payload.string_val("mode")?;
            payload.string_val("version")?;
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builders, error::ProtocolError};

    #[test]
    fn builder_output_always_validates() {
        validate(Opcode::SoftStop, builders::soft_stop(30).payload()).expect("valid");
        validate(Opcode::LiveStateRequest, builders::live_state_request().payload()).expect("valid");
        let live = builders::live_state(1, 2, "n", "m", "mo", "v");
        validate(Opcode::LiveState, live.payload()).expect("valid");
    }

    #[test]
    fn missing_mandatory_field_is_rejected() {
        let err = validate(Opcode::SoftStop, &Payload::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField(_)));
    }

    #[test]
    fn wrong_kind_for_mandatory_field_is_rejected() {
        let mut payload = Payload::new();
        payload.set_string("timeout", "soon").expect("new field");
        let err = validate(Opcode::SoftStop, &payload).unwrap_err();
        assert!(matches!(err, ProtocolError::TypeMismatch { .. }));
    }

    #[test]
    fn framing_reserved_opcodes_always_validate() {
        validate(Opcode::Hello, &Payload::new()).expect("hello has no schema");
        validate(Opcode::Health, &Payload::new()).expect("health has no schema");
    }
}
