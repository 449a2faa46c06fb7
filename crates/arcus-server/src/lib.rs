//! Single-listener, single-accepted-peer Arcus server.
//!
//! A [`Server`] is the game-server side of the protocol: it listens on one
//! TCP port, accepts at most one agent connection, and is the Hello
//! initiator once a peer is accepted. Incoming messages are dispatched to
//! per-opcode callbacks registered through [`Server::set_soft_stop_callback`]
//! and friends; outgoing messages are built with `arcus_proto::builders` and
//! validated against their opcode's schema before being handed to the
//! connection.
//!
//! The public surface is guarded by a single [`parking_lot::Mutex`] held for
//! the duration of one call - `update()`, every `send_*`, and every
//! `set_*_callback` may be called from different threads, but registered
//! callbacks run while that lock is held. Embedders must not call back into
//! the same [`Server`] from inside a callback.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod registry;

use std::time::{Duration, Instant};

pub use arcus_core::connection::ConnectionConfig;
pub use arcus_core::LogLevel;
use arcus_core::{Connection, ConnectionState, Socket};
use arcus_proto::{builders, schema, Message, Opcode, Payload, Val};
pub use error::ServerError;
use parking_lot::Mutex;
pub use registry::ServerCallbacks;

type Logger = Box<dyn Fn(LogLevel, &str) + Send>;

/// How many pending connections the OS may queue before `accept()` is
/// called. Advisory - see [`Socket::bind_listener`].
pub const DEFAULT_LISTEN_BACKLOG: u32 = 1;

/// Tunables for a [`Server`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConfig {
    /// Passed straight through to the accepted peer's `Connection`.
    pub connection: ConnectionConfig,
}

/// Coarse status, mapping the accepted peer's `Connection` state to a value
/// an embedder can poll without inspecting the handshake substeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// No peer has been accepted yet; the listen socket is waiting.
    WaitingForClient,
    /// A peer was accepted and the handshake is in progress.
    Handshake,
    /// Handshake complete; application messages flow in both directions.
    Ready,
    /// The accepted peer's connection just errored. Transient: by the next
    /// `update()` the server has already reset and returned to
    /// `waiting_for_client`, since this design does not retain a failed
    /// peer connection.
    Error,
}

struct Inner<U> {
    listen_socket: Socket,
    connection: Connection,
    peer_connected: bool,
    callbacks: ServerCallbacks<U>,
    logger: Option<Logger>,
    user_data: U,
}

impl<U> Inner<U> {
    fn emit(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        if let Some(logger) = &self.logger {
            logger(level, message);
        }
    }

    fn listen(&mut self, port: u16) -> Result<(), ServerError> {
        self.listen_socket.bind_listener(port, DEFAULT_LISTEN_BACKLOG)?;
        self.emit(LogLevel::Info, &format!("server listening on port {port}"));
        Ok(())
    }

    fn accept_if_waiting(&mut self, now: Instant) -> Result<(), ServerError> {
        if !self.listen_socket.ready_for_read(Duration::ZERO)? {
            return Ok(());
        }
        let Some((peer, addr)) = self.listen_socket.accept()? else {
            return Ok(());
        };
        self.emit(LogLevel::Info, &format!("accepted peer {addr}, initiating handshake"));
        self.connection.init(peer, now);
        self.connection.initiate_handshake().map_err(ServerError::Connection)?;
        self.peer_connected = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.connection.shutdown();
        self.peer_connected = false;
    }

    fn update(&mut self, now: Instant) -> Result<(), ServerError> {
        if !self.peer_connected {
            return self.accept_if_waiting(now);
        }
        match self.connection.update(now) {
            Ok(()) => {
                self.drain_incoming()?;
                Ok(())
            },
            Err(e) => {
                self.emit(LogLevel::Error, &format!("connection errored, returning to waiting_for_client: {e}"));
                self.reset();
                Err(e.into())
            },
        }
    }

    fn drain_incoming(&mut self) -> Result<(), ServerError> {
        while self.connection.incoming_count() > 0 {
            let callbacks = &mut self.callbacks;
            let user_data = &mut self.user_data;
            self.connection
                .remove_incoming(|message| {
                    dispatch(message, callbacks, user_data);
                    Ok(())
                })
                .map_err(ServerError::Connection)?;
        }
        Ok(())
    }

    fn process_outgoing(&mut self, message: Message) -> Result<(), ServerError> {
        schema::validate(message.opcode(), message.payload()).map_err(ServerError::InvalidOutgoing)?;
        self.connection.add_outgoing(message).map_err(ServerError::Connection)
    }

    fn status(&self) -> ServerStatus {
        if !self.peer_connected {
            return ServerStatus::WaitingForClient;
        }
        match self.connection.state() {
            ConnectionState::Ready => ServerStatus::Ready,
            ConnectionState::Error => ServerStatus::Error,
            ConnectionState::Uninitialized => ServerStatus::WaitingForClient,
            _ => ServerStatus::Handshake,
        }
    }
}

/// Dispatches one decoded message to its registered callback, if any.
///
/// A message whose payload fails the opcode's schema, or whose opcode has no
/// callback registered, is logged and dropped rather than treated as a
/// connection fault.
fn dispatch<U>(message: &Message, callbacks: &mut ServerCallbacks<U>, user_data: &mut U) {
    let opcode = message.opcode();
    let payload = message.payload();
    if let Err(e) = schema::validate(opcode, payload) {
        tracing::warn!(?opcode, error = %e, "incoming message failed schema validation, dropping");
        return;
    }
    match opcode {
        Opcode::SoftStop => call(&mut callbacks.soft_stop, user_data, |p| p.int_val("timeout"), payload),
        Opcode::Allocated => call(&mut callbacks.allocated, user_data, |p| p.array_val("data"), payload),
        Opcode::Metadata => call(&mut callbacks.metadata, user_data, |p| p.array_val("data"), payload),
        Opcode::ApplicationInstanceStatus => {
            call(&mut callbacks.application_instance_status, user_data, |p| p.int_val("status"), payload);
        },
        Opcode::LiveStateRequest => {
            if let Some(cb) = callbacks.live_state_request.as_mut() {
                cb(user_data);
            }
        },
        Opcode::CustomCommand => call(&mut callbacks.custom_command, user_data, |p| p.array_val("data"), payload),
        Opcode::Invalid | Opcode::Hello | Opcode::Health | Opcode::ReverseMetadata | Opcode::HostInformation
        | Opcode::ApplicationInstanceInformation | Opcode::LiveState => {
            tracing::debug!(?opcode, "no callback registered for this opcode on the server side, dropping");
        },
    }
}

fn call<U, T>(
    slot: &mut Option<Box<dyn FnMut(&mut U, T) + Send>>,
    user_data: &mut U,
    extract: impl FnOnce(&Payload) -> arcus_proto::Result<T>,
    payload: &Payload,
) {
    let Some(cb) = slot.as_mut() else { return };
    match extract(payload) {
        Ok(value) => cb(user_data, value),
        Err(e) => tracing::warn!(error = %e, "callback field extraction failed after schema validation passed"),
    }
}

/// The game-server side of an Arcus connection.
///
/// See the module docs for the threading contract.
pub struct Server<U> {
    inner: Mutex<Inner<U>>,
}

impl<U> Server<U> {
    /// Creates a server with `config`, owning `user_data` for the lifetime
    /// of every registered callback.
    ///
    /// Does not bind or listen yet - call [`Self::listen`] next.
    ///
    /// # Errors
    ///
    /// Propagates any OS error from creating the listen socket's readiness
    /// poller.
    pub fn init(config: ServerConfig, user_data: U) -> Result<Self, ServerError> {
        let inner = Inner {
            listen_socket: Socket::new()?,
            connection: Connection::new(config.connection),
            peer_connected: false,
            callbacks: ServerCallbacks::default(),
            logger: None,
            user_data,
        };
        Ok(Self { inner: Mutex::new(inner) })
    }

    /// Binds and starts listening on `port`.
    ///
    /// # Errors
    ///
    /// Propagates any OS error from the bind.
    pub fn listen(&self, port: u16) -> Result<(), ServerError> {
        self.inner.lock().listen(port)
    }

    /// Tears the accepted peer's connection down and returns to
    /// `waiting_for_client`. Idempotent - safe to call with no peer
    /// connected.
    pub fn shutdown(&self) {
        self.inner.lock().reset();
    }

    /// Registers a per-instance logger override. Every log line this server
    /// would otherwise only emit through `tracing` is also passed to
    /// `callback` as a level and a rendered message.
    pub fn set_logger(&self, callback: impl Fn(LogLevel, &str) + Send + 'static) {
        self.inner.lock().logger = Some(Box::new(callback));
    }

    /// Runs one round: accept a pending peer, or pump an already-accepted
    /// connection's handshake/health/message traffic and dispatch any newly
    /// decoded messages to their registered callbacks.
    ///
    /// # Errors
    ///
    /// Propagates a fatal [`arcus_core::ConnectionError`] if the accepted
    /// peer's connection just errored. The server has already reset to
    /// `waiting_for_client` by the time this returns.
    pub fn update(&self, now: Instant) -> Result<(), ServerError> {
        self.inner.lock().update(now)
    }

    /// Coarse status derived from the accepted peer's connection state.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        self.inner.lock().status()
    }

    /// Sends a `reverse_metadata` message in reply to an agent's `metadata`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Connection`] if the outgoing queue is full.
    pub fn send_reverse_metadata(&self, data: Vec<Val>) -> Result<(), ServerError> {
        self.inner.lock().process_outgoing(builders::reverse_metadata(data))
    }

    /// Sends a `live_state` message describing the game server's current
    /// state.
    ///
    /// # Errors
    ///
    /// [`ServerError::Connection`] if the outgoing queue is full.
    #[allow(clippy::too_many_arguments)]
    pub fn send_live_state(
        &self,
        players: i32,
        max_players: i32,
        name: &str,
        map: &str,
        mode: &str,
        version: &str,
    ) -> Result<(), ServerError> {
        self.inner
            .lock()
            .process_outgoing(builders::live_state(players, max_players, name, map, mode, version))
    }

    /// Sends a `host_information` message.
    ///
    /// # Errors
    ///
    /// [`ServerError::Connection`] if the outgoing queue is full.
    pub fn send_host_information(&self, info: &Payload) -> Result<(), ServerError> {
        self.inner.lock().process_outgoing(builders::host_information(info))
    }

    /// Sends an `application_instance_information` message.
    ///
    /// # Errors
    ///
    /// [`ServerError::Connection`] if the outgoing queue is full.
    pub fn send_application_instance_information(&self, info: &Payload) -> Result<(), ServerError> {
        self.inner.lock().process_outgoing(builders::application_instance_information(info))
    }

    /// Sends a `custom_command` message. Either peer may send this opcode.
    ///
    /// # Errors
    ///
    /// [`ServerError::Connection`] if the outgoing queue is full.
    pub fn send_custom_command(&self, data: Vec<Val>) -> Result<(), ServerError> {
        self.inner.lock().process_outgoing(builders::custom_command(data))
    }

    /// Registers the callback invoked when an agent sends `soft_stop`.
    pub fn set_soft_stop_callback(&self, callback: impl FnMut(&mut U, i32) + Send + 'static) {
        self.inner.lock().callbacks.soft_stop = Some(Box::new(callback));
    }

    /// Registers the callback invoked when an agent sends `allocated`.
    pub fn set_allocated_callback(&self, callback: impl FnMut(&mut U, Vec<Val>) + Send + 'static) {
        self.inner.lock().callbacks.allocated = Some(Box::new(callback));
    }

    /// Registers the callback invoked when an agent sends `metadata`.
    pub fn set_metadata_callback(&self, callback: impl FnMut(&mut U, Vec<Val>) + Send + 'static) {
        self.inner.lock().callbacks.metadata = Some(Box::new(callback));
    }

    /// Registers the callback invoked when an agent sends
    /// `application_instance_status`.
    pub fn set_application_instance_status_callback(&self, callback: impl FnMut(&mut U, i32) + Send + 'static) {
        self.inner.lock().callbacks.application_instance_status = Some(Box::new(callback));
    }

    /// Registers the callback invoked when an agent sends
    /// `live_state_request`.
    pub fn set_live_state_request_callback(&self, callback: impl FnMut(&mut U) + Send + 'static) {
        self.inner.lock().callbacks.live_state_request = Some(Box::new(callback));
    }

    /// Registers the callback invoked when either peer sends
    /// `custom_command`.
    pub fn set_custom_command_callback(&self, callback: impl FnMut(&mut U, Vec<Val>) + Send + 'static) {
        self.inner.lock().callbacks.custom_command = Some(Box::new(callback));
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream as StdTcpStream;

    use super::*;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0").expect("bind").local_addr().expect("addr").port()
    }

    #[test]
    fn status_is_waiting_for_client_before_any_peer_connects() {
        let server: Server<()> = Server::init(ServerConfig::default(), ()).expect("init");
        let port = free_port();
        server.listen(port).expect("listen");
        server.update(Instant::now()).expect("update with no peer yet");
        assert_eq!(server.status(), ServerStatus::WaitingForClient);
    }

    #[test]
    fn accepting_a_peer_starts_the_handshake() {
        let server: Server<()> = Server::init(ServerConfig::default(), ()).expect("init");
        let port = free_port();
        server.listen(port).expect("listen");

        let _client_raw = StdTcpStream::connect(("127.0.0.1", port)).expect("connect");
        let now = Instant::now();
        for _ in 0..4 {
            let _ = server.update(now);
        }
        assert_ne!(server.status(), ServerStatus::WaitingForClient);
    }

    #[test]
    fn outgoing_validation_rejects_malformed_payload() {
        let server: Server<()> = Server::init(
            ServerConfig { connection: ConnectionConfig::default() },
            (),
        )
        .expect("init");
        let mut bad = Payload::new();
        bad.set_string("hostInformation", "not an object").expect("new field");
        let err = server.inner.lock().process_outgoing(Message::new(Opcode::HostInformation, bad)).unwrap_err();
        assert!(matches!(err, ServerError::InvalidOutgoing(_)));
    }

    #[test]
    fn shutdown_returns_to_waiting_for_client() {
        let server: Server<()> = Server::init(ServerConfig::default(), ()).expect("init");
        let port = free_port();
        server.listen(port).expect("listen");

        let _client_raw = StdTcpStream::connect(("127.0.0.1", port)).expect("connect");
        let now = Instant::now();
        for _ in 0..4 {
            let _ = server.update(now);
        }
        assert_ne!(server.status(), ServerStatus::WaitingForClient);

        server.shutdown();
        assert_eq!(server.status(), ServerStatus::WaitingForClient);
    }

    #[test]
    fn logger_override_receives_lifecycle_events() {
        use std::sync::{Arc, Mutex as StdMutex};

        let server: Server<()> = Server::init(ServerConfig::default(), ()).expect("init");
        let lines: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        server.set_logger(move |_level, message| sink.lock().expect("lock").push(message.to_string()));

        let port = free_port();
        server.listen(port).expect("listen");
        assert!(lines.lock().expect("lock").iter().any(|line| line.contains("listening")));
    }

    #[test]
    fn soft_stop_callback_receives_timeout() {
        let server: Server<i32> = Server::init(ServerConfig::default(), 0).expect("init");
        server.set_soft_stop_callback(|data, timeout| *data = timeout);

        let mut payload = Payload::new();
        payload.set_int("timeout", 42).expect("new field");
        let message = Message::new(Opcode::SoftStop, payload);

        let mut inner = server.inner.lock();
        let callbacks = &mut inner.callbacks;
        let user_data = &mut inner.user_data;
        dispatch(&message, callbacks, user_data);
        assert_eq!(*user_data, 42);
    }
}
