//! Per-opcode callback registry.
//!
//! Each opcode a game server can receive from an agent gets its own typed
//! callback slot, generic over a single user-data type `U` the caller
//! threads through every invocation instead of closing over shared state.

use arcus_proto::Val;

/// Callbacks for every opcode an agent may send to a game server.
///
/// A `None` slot means "no callback registered"; [`crate::Server::update`]
/// silently drops messages for opcodes with nothing registered.
pub struct ServerCallbacks<U> {
    pub(crate) soft_stop: Option<Box<dyn FnMut(&mut U, i32) + Send>>,
    pub(crate) allocated: Option<Box<dyn FnMut(&mut U, Vec<Val>) + Send>>,
    pub(crate) metadata: Option<Box<dyn FnMut(&mut U, Vec<Val>) + Send>>,
    pub(crate) application_instance_status: Option<Box<dyn FnMut(&mut U, i32) + Send>>,
    pub(crate) live_state_request: Option<Box<dyn FnMut(&mut U) + Send>>,
    pub(crate) custom_command: Option<Box<dyn FnMut(&mut U, Vec<Val>) + Send>>,
}

impl<U> Default for ServerCallbacks<U> {
    fn default() -> Self {
        Self {
            soft_stop: None,
            allocated: None,
            metadata: None,
            application_instance_status: None,
            live_state_request: None,
            custom_command: None,
        }
    }
}
