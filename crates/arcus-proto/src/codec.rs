//! Pure encode/decode functions tying [`Header`], [`Payload`], and
//! [`Message`] together. No I/O lives here - callers own the bytes.

use crate::{
    error::{ProtocolError, Result},
    header::{self, Header},
    message::Message,
    payload::Payload,
};

/// Serializes a message to a fully framed byte vector (header followed by
/// its JSON payload).
///
/// # Errors
///
/// [`ProtocolError::Json`] if the payload fails to serialize,
/// [`ProtocolError::PayloadTooLarge`] if the serialized payload exceeds
/// [`header::PAYLOAD_MAX`].
pub fn message_to_bytes(message: &Message, packet_id: u32) -> Result<Vec<u8>> {
    let payload_bytes = if message.payload().is_empty() {
        Vec::new()
    } else {
        message.payload().to_bytes()?
    };
    if payload_bytes.len() > header::PAYLOAD_MAX {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload_bytes.len(),
            max: header::PAYLOAD_MAX,
        });
    }
    let head = Header::new(
        message.opcode(),
        packet_id,
        u32::try_from(payload_bytes.len()).unwrap_or(u32::MAX),
    );
    let mut out = Vec::with_capacity(header::SIZE + payload_bytes.len());
    out.extend_from_slice(&head.encode());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Parses a header out of a byte buffer.
///
/// This only looks at the first [`header::SIZE`] bytes; it does not require
/// the payload to be present yet. Callers drive a streaming decode by first
/// calling this, then waiting until `header.length()` more bytes have
/// arrived, then calling [`payload_from_bytes`].
///
/// # Errors
///
/// [`ProtocolError::Incomplete`] if fewer than [`header::SIZE`] bytes are
/// available (not a fatal error - ask again once more bytes arrive). Any
/// other [`ProtocolError`] from [`Header::decode`] is fatal.
pub fn header_from_bytes(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < header::SIZE {
        return Err(ProtocolError::Incomplete { have: bytes.len(), needed: header::SIZE });
    }
    Header::decode(bytes)
}

/// Parses the payload belonging to `header` out of the bytes immediately
/// following it.
///
/// # Errors
///
/// [`ProtocolError::Incomplete`] if `bytes` holds fewer than
/// `header.length()` bytes. Any [`ProtocolError`] from [`Payload::from_bytes`]
/// is fatal.
pub fn payload_from_bytes(header: &Header, bytes: &[u8]) -> Result<Payload> {
    let needed = header.length() as usize;
    if bytes.len() < needed {
        return Err(ProtocolError::Incomplete { have: bytes.len(), needed });
    }
    Payload::from_bytes(&bytes[..needed])
}

/// Decodes a complete message (header + payload) from the front of `bytes`,
/// returning the message and the number of bytes it consumed.
///
/// # Errors
///
/// [`ProtocolError::Incomplete`] if the buffer does not yet hold a full
/// frame - the caller should retry once more bytes have arrived. Any other
/// error is fatal for the connection.
pub fn message_from_bytes(bytes: &[u8]) -> Result<(Message, usize)> {
    let header = header_from_bytes(bytes)?;
    let payload = payload_from_bytes(&header, &bytes[header::SIZE..])?;
    let consumed = header::SIZE + header.length() as usize;
    Ok((Message::new(header.opcode(), payload), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    #[test]
    fn message_round_trips_through_bytes() {
        let mut payload = Payload::new();
        payload.set_int("players", 3).expect("new field");
        let message = Message::new(Opcode::LiveState, payload);

        let bytes = message_to_bytes(&message, 5).expect("encode");
        let (decoded, consumed) = message_from_bytes(&bytes).expect("decode");

        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.opcode(), Opcode::LiveState);
        assert_eq!(decoded.payload().int_val("players").expect("int"), 3);
    }

    #[test]
    fn empty_payload_message_round_trips() {
        let message = Message::new(Opcode::Health, Payload::new());
        let bytes = message_to_bytes(&message, 1).expect("encode");
        assert_eq!(bytes.len(), header::SIZE);
        let (decoded, consumed) = message_from_bytes(&bytes).expect("decode");
        assert_eq!(consumed, header::SIZE);
        assert!(decoded.payload().is_empty());
    }

    #[test]
    fn header_only_is_incomplete_without_payload_bytes() {
        let mut payload = Payload::new();
        payload.set_string("map", "long_enough_value_to_not_be_empty").expect("new field");
        let message = Message::new(Opcode::LiveState, payload);
        let bytes = message_to_bytes(&message, 1).expect("encode");

        let err = message_from_bytes(&bytes[..header::SIZE + 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::Incomplete { .. }));
    }

    #[test]
    fn short_buffer_is_incomplete_not_fatal() {
        let err = message_from_bytes(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::Incomplete { .. }));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::super::*;
        use crate::opcode::Opcode;

        proptest! {
            #[test]
            fn message_round_trip_any_string_payload(
                players in 0i32..10_000,
                map in "[a-z_]{0,32}",
                packet_id in any::<u32>(),
            ) {
                let mut payload = Payload::new();
                payload.set_int("players", players).expect("new field");
                payload.set_string("map", &map).expect("new field");
                let message = Message::new(Opcode::LiveState, payload);

                let bytes = message_to_bytes(&message, packet_id).expect("encode");
                let (decoded, consumed) = message_from_bytes(&bytes).expect("decode");

                prop_assert_eq!(consumed, bytes.len());
                prop_assert_eq!(decoded.payload().int_val("players").unwrap(), players);
                prop_assert_eq!(decoded.payload().string_val("map").unwrap(), map);
            }
        }
    }
}
