//! Constructors for the application message schemas.
//!
//! Each function builds the payload fields a given opcode is expected to
//! carry. Field names and shapes mirror the application's handshake-free
//! request/response pairs: a request most peers send with no fields at all,
//! and the richer status/information responses.
//!
//! Every field name here is distinct and written into a freshly constructed
//! [`Payload`], so the "existing key, different type" failure the setters can
//! return never applies - the `let _ =` discards below are not ignoring a
//! real possibility, just the general fallible shape of [`Payload::set_int`]
//! and friends.

use crate::{message::Message, opcode::Opcode, payload::Payload};

/// Builds a `soft_stop` request payload.
#[must_use]
pub fn soft_stop(timeout_seconds: i32) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_int("timeout", timeout_seconds);
    Message::new(Opcode::SoftStop, payload)
}

/// Builds an `allocated` notification payload.
#[must_use]
pub fn allocated(data: Vec<crate::payload::Val>) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_array("data", data);
    Message::new(Opcode::Allocated, payload)
}

/// Builds a `metadata` request payload.
#[must_use]
pub fn metadata(data: Vec<crate::payload::Val>) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_array("data", data);
    Message::new(Opcode::Metadata, payload)
}

/// Builds a `reverse_metadata` response payload.
#[must_use]
pub fn reverse_metadata(data: Vec<crate::payload::Val>) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_array("data", data);
    Message::new(Opcode::ReverseMetadata, payload)
}

/// Builds a `host_information` response payload.
#[must_use]
pub fn host_information(info: &Payload) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_object("hostInformation", info);
    Message::new(Opcode::HostInformation, payload)
}

/// Builds an `application_instance_information` response payload.
#[must_use]
pub fn application_instance_information(info: &Payload) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_object("applicationInstanceInformation", info);
    Message::new(Opcode::ApplicationInstanceInformation, payload)
}

/// Builds an `application_instance_status` request payload.
#[must_use]
pub fn application_instance_status(status: i32) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_int("status", status);
    Message::new(Opcode::ApplicationInstanceStatus, payload)
}

/// Builds a `live_state_request` payload (no fields).
#[must_use]
pub fn live_state_request() -> Message {
    Message::new(Opcode::LiveStateRequest, Payload::new())
}

/// Builds a `live_state` response payload.
#[must_use]
pub fn live_state(players: i32, max_players: i32, name: &str, map: &str, mode: &str, version: &str) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_int("players", players);
    let _ = payload.set_int("maxPlayers", max_players);
    let _ = payload.set_string("name", name);
    let _ = payload.set_string("map", map);
    let _ = payload.set_string("mode", mode);
    let _ = payload.set_string("version", version);
    Message::new(Opcode::LiveState, payload)
}

/// Builds a `custom_command` payload, sendable by either peer.
#[must_use]
pub fn custom_command(data: Vec<crate::payload::Val>) -> Message {
    let mut payload = Payload::new();
    let _ = payload.set_array("data", data);
    Message::new(Opcode::CustomCommand, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_state_carries_all_fields() {
        let message = live_state(4, 16, "server-1", "de_dust2", "competitive", "1.0");
        let payload = message.payload();
        assert_eq!(payload.int_val("players").expect("players"), 4);
        assert_eq!(payload.int_val("maxPlayers").expect("max"), 16);
        assert_eq!(payload.string_val("map").expect("map"), "de_dust2");
    }

    #[test]
    fn live_state_request_has_no_fields() {
        let message = live_state_request();
        assert!(message.payload().is_empty());
    }

    #[test]
    fn custom_command_carries_data_array() {
        let message = custom_command(vec![crate::payload::Val::String("key".into())]);
        assert_eq!(message.opcode(), Opcode::CustomCommand);
        assert_eq!(message.payload().array_val("data").expect("data").len(), 1);
    }
}
