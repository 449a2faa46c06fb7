//! Per-opcode callback registry.
//!
//! Each opcode a management agent can receive from a game server gets its
//! own typed callback slot, generic over a single user-data type `U` the
//! caller threads through every invocation instead of closing over shared
//! state.

use arcus_proto::{Payload, Val};

/// Callbacks for every opcode a game server may send to an agent.
///
/// A `None` slot means "no callback registered"; [`crate::Client::update`]
/// silently drops messages for opcodes with nothing registered.
pub struct ClientCallbacks<U> {
    pub(crate) reverse_metadata: Option<Box<dyn FnMut(&mut U, Vec<Val>) + Send>>,
    pub(crate) live_state:
        Option<Box<dyn FnMut(&mut U, i32, i32, String, String, String, String) + Send>>,
    pub(crate) host_information: Option<Box<dyn FnMut(&mut U, Payload) + Send>>,
    pub(crate) application_instance_information: Option<Box<dyn FnMut(&mut U, Payload) + Send>>,
    pub(crate) custom_command: Option<Box<dyn FnMut(&mut U, Vec<Val>) + Send>>,
}

impl<U> Default for ClientCallbacks<U> {
    fn default() -> Self {
        Self {
            reverse_metadata: None,
            live_state: None,
            host_information: None,
            application_instance_information: None,
            custom_command: None,
        }
    }
}
