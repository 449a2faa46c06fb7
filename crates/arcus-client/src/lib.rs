//! Auto-reconnecting Arcus client used by a management agent.
//!
//! A [`Client`] is the agent side of the protocol: it owns one outgoing TCP
//! connection to a game server, reconnecting on a timer whenever it is not
//! currently connected, and passively waits for the server's Hello rather
//! than initiating the handshake itself. Incoming messages are dispatched to
//! per-opcode callbacks registered through
//! [`Client::set_reverse_metadata_callback`] and friends; outgoing messages
//! are built with `arcus_proto::builders` and validated against their
//! opcode's schema before being handed to the connection.
//!
//! The public surface is guarded by a single [`parking_lot::Mutex`] held for
//! the duration of one call - `update()`, every `send_*`, and every
//! `set_*_callback` may be called from different threads, but registered
//! callbacks run while that lock is held. Embedders must not call back into
//! the same [`Client`] from inside a callback.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod registry;

use std::net::IpAddr;
use std::time::{Duration, Instant};

pub use arcus_core::connection::ConnectionConfig;
pub use arcus_core::LogLevel;
use arcus_core::{Connection, ConnectionState, Socket};
use arcus_proto::{builders, schema, Message, Opcode, Payload, Val};
pub use error::ClientError;
use parking_lot::Mutex;
pub use registry::ClientCallbacks;

type Logger = Box<dyn Fn(LogLevel, &str) + Send>;

/// How long to wait between reconnect attempts while not connected.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Tunables for a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Passed straight through to the connection.
    pub connection: ConnectionConfig,
    /// How long to wait between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { connection: ConnectionConfig::default(), reconnect_delay: DEFAULT_RECONNECT_DELAY }
    }
}

/// Coarse status, mapping whether a socket is connected and the underlying
/// `Connection` state to a value an embedder can poll without inspecting the
/// handshake substeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Not currently connected; waiting for the next reconnect attempt.
    Connecting,
    /// A socket is connected and the handshake is in progress.
    Handshake,
    /// Handshake complete; application messages flow in both directions.
    Ready,
    /// The connection just errored. Transient: by the next `update()` the
    /// client has already reset and is retrying the connection from scratch.
    Error,
}

struct Inner<U> {
    addr: IpAddr,
    port: u16,
    connection: Connection,
    is_connected: bool,
    last_attempt: Option<Instant>,
    reconnect_delay: Duration,
    callbacks: ClientCallbacks<U>,
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

    fn due_for_attempt(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.duration_since(last) >= self.reconnect_delay,
        }
    }

    fn attempt_connect(&mut self, now: Instant) -> Result<(), ClientError> {
        if !self.due_for_attempt(now) {
            return Ok(());
        }
        self.last_attempt = Some(now);
        let mut socket = Socket::new()?;
        match socket.connect(self.addr, self.port) {
            Ok(()) => {
                self.emit(LogLevel::Info, &format!("connecting to {}:{}", self.addr, self.port));
                self.connection.init(socket, now);
                self.is_connected = true;
                Ok(())
            },
            Err(e) => {
                self.emit(LogLevel::Debug, &format!("reconnect attempt failed: {e}"));
                Ok(())
            },
        }
    }

    fn reset(&mut self) {
        self.connection.shutdown();
        self.is_connected = false;
    }

    fn update(&mut self, now: Instant) -> Result<(), ClientError> {
        if !self.is_connected {
            return self.attempt_connect(now);
        }
        match self.connection.update(now) {
            Ok(()) => {
                self.drain_incoming()?;
                Ok(())
            },
            Err(e) => {
                self.emit(LogLevel::Error, &format!("connection errored, reconnecting: {e}"));
                self.reset();
                Err(e.into())
            },
        }
    }

    fn drain_incoming(&mut self) -> Result<(), ClientError> {
        while self.connection.incoming_count() > 0 {
            let callbacks = &mut self.callbacks;
            let user_data = &mut self.user_data;
            self.connection
                .remove_incoming(|message| {
                    dispatch(message, callbacks, user_data);
                    Ok(())
                })
                .map_err(ClientError::Connection)?;
        }
        Ok(())
    }

    fn process_outgoing(&mut self, message: Message) -> Result<(), ClientError> {
        schema::validate(message.opcode(), message.payload()).map_err(ClientError::InvalidOutgoing)?;
        self.connection.add_outgoing(message).map_err(ClientError::Connection)
    }

    fn status(&self) -> ClientStatus {
        if !self.is_connected {
            return ClientStatus::Connecting;
        }
        match self.connection.state() {
            ConnectionState::Ready => ClientStatus::Ready,
            ConnectionState::Error => ClientStatus::Error,
            ConnectionState::Uninitialized => ClientStatus::Connecting,
            _ => ClientStatus::Handshake,
        }
    }
}

/// Dispatches one decoded message to its registered callback, if any.
///
/// A message whose payload fails the opcode's schema, or whose opcode has no
/// callback registered, is logged and dropped rather than treated as a
/// connection fault.
fn dispatch<U>(message: &Message, callbacks: &mut ClientCallbacks<U>, user_data: &mut U) {
    let opcode = message.opcode();
    let payload = message.payload();
    if let Err(e) = schema::validate(opcode, payload) {
        tracing::warn!(?opcode, error = %e, "incoming message failed schema validation, dropping");
        return;
    }
    match opcode {
        Opcode::ReverseMetadata => {
            call(&mut callbacks.reverse_metadata, user_data, |p| p.array_val("data"), payload);
        },
        Opcode::HostInformation => {
            call(&mut callbacks.host_information, user_data, |p| p.object_val("hostInformation"), payload);
        },
        Opcode::ApplicationInstanceInformation => {
            call(
                &mut callbacks.application_instance_information,
                user_data,
                |p| p.object_val("applicationInstanceInformation"),
                payload,
            );
        },
        Opcode::LiveState => {
            let Some(cb) = callbacks.live_state.as_mut() else { return };
            match live_state_fields(payload) {
                Ok((players, max_players, name, map, mode, version)) => {
                    cb(user_data, players, max_players, name, map, mode, version);
                },
                Err(e) => tracing::warn!(error = %e, "live_state field extraction failed after schema validation passed"),
            }
        },
        Opcode::CustomCommand => call(&mut callbacks.custom_command, user_data, |p| p.array_val("data"), payload),
        Opcode::Invalid | Opcode::Hello | Opcode::Health | Opcode::SoftStop | Opcode::Allocated
        | Opcode::Metadata | Opcode::ApplicationInstanceStatus | Opcode::LiveStateRequest => {
            tracing::debug!(?opcode, "no callback registered for this opcode on the client side, dropping");
        },
    }
}

#[allow(clippy::type_complexity)]
fn live_state_fields(payload: &Payload) -> arcus_proto::Result<(i32, i32, String, String, String, String)> {
    Ok((
        payload.int_val("players")?,
        payload.int_val("maxPlayers")?,
        payload.string_val("name")?,
        payload.string_val("map")?,
        payload.string_val("mode")?,
        payload.string_val("version")?,
    ))
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

/// The management-agent side of an Arcus connection.
///
/// See the module docs for the threading contract.
pub struct Client<U> {
    inner: Mutex<Inner<U>>,
}

impl<U> Client<U> {
    /// Creates a client targeting `addr:port`, owning `user_data` for the
    /// lifetime of every registered callback.
    ///
    /// Does not connect yet - the first [`Self::update`] call attempts it.
    #[must_use]
    pub fn init(addr: IpAddr, port: u16, config: ClientConfig, user_data: U) -> Self {
        let inner = Inner {
            addr,
            port,
            connection: Connection::new(config.connection),
            is_connected: false,
            last_attempt: None,
            reconnect_delay: config.reconnect_delay,
            callbacks: ClientCallbacks::default(),
            logger: None,
            user_data,
        };
        Self { inner: Mutex::new(inner) }
    }

    /// Runs one round: attempt a reconnect if not currently connected, or
    /// pump an already-connected connection's handshake/health/message
    /// traffic and dispatch any newly decoded messages to their registered
    /// callbacks.
    ///
    /// # Errors
    ///
    /// Propagates a fatal [`arcus_core::ConnectionError`] if the connection
    /// just errored. The client has already reset and will retry the
    /// connection by the time this returns.
    pub fn update(&self, now: Instant) -> Result<(), ClientError> {
        self.inner.lock().update(now)
    }

    /// Coarse status derived from the connection state.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        self.inner.lock().status()
    }

    /// Tears the current connection down, if any, and returns to
    /// `connecting`. The next `update()` attempts a fresh connection
    /// immediately, ignoring the reconnect delay. Idempotent.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.reset();
        inner.last_attempt = None;
    }

    /// Registers a per-instance logger override. Every log line this client
    /// would otherwise only emit through `tracing` is also passed to
    /// `callback` as a level and a rendered message.
    pub fn set_logger(&self, callback: impl Fn(LogLevel, &str) + Send + 'static) {
        self.inner.lock().logger = Some(Box::new(callback));
    }

    /// Sends a `soft_stop` request.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the outgoing queue is full.
    pub fn send_soft_stop(&self, timeout_seconds: i32) -> Result<(), ClientError> {
        self.inner.lock().process_outgoing(builders::soft_stop(timeout_seconds))
    }

    /// Sends an `allocated` notification.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the outgoing queue is full.
    pub fn send_allocated(&self, data: Vec<Val>) -> Result<(), ClientError> {
        self.inner.lock().process_outgoing(builders::allocated(data))
    }

    /// Sends a `metadata` request.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the outgoing queue is full.
    pub fn send_metadata(&self, data: Vec<Val>) -> Result<(), ClientError> {
        self.inner.lock().process_outgoing(builders::metadata(data))
    }

    /// Sends an `application_instance_status` update.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the outgoing queue is full.
    pub fn send_application_instance_status(&self, status: i32) -> Result<(), ClientError> {
        self.inner.lock().process_outgoing(builders::application_instance_status(status))
    }

    /// Sends a `live_state_request`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the outgoing queue is full.
    pub fn send_live_state_request(&self) -> Result<(), ClientError> {
        self.inner.lock().process_outgoing(builders::live_state_request())
    }

    /// Sends a `custom_command` message. Either peer may send this opcode.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the outgoing queue is full.
    pub fn send_custom_command(&self, data: Vec<Val>) -> Result<(), ClientError> {
        self.inner.lock().process_outgoing(builders::custom_command(data))
    }

    /// Registers the callback invoked when the server sends
    /// `reverse_metadata`.
    pub fn set_reverse_metadata_callback(&self, callback: impl FnMut(&mut U, Vec<Val>) + Send + 'static) {
        self.inner.lock().callbacks.reverse_metadata = Some(Box::new(callback));
    }

    /// Registers the callback invoked when the server sends `live_state`.
    #[allow(clippy::type_complexity)]
    pub fn set_live_state_callback(
        &self,
        callback: impl FnMut(&mut U, i32, i32, String, String, String, String) + Send + 'static,
    ) {
        self.inner.lock().callbacks.live_state = Some(Box::new(callback));
    }

    /// Registers the callback invoked when the server sends
    /// `host_information`.
    pub fn set_host_information_callback(&self, callback: impl FnMut(&mut U, Payload) + Send + 'static) {
        self.inner.lock().callbacks.host_information = Some(Box::new(callback));
    }

    /// Registers the callback invoked when the server sends
    /// `application_instance_information`.
    pub fn set_application_instance_information_callback(
        &self,
        callback: impl FnMut(&mut U, Payload) + Send + 'static,
    ) {
        self.inner.lock().callbacks.application_instance_information = Some(Box::new(callback));
    }

    /// Registers the callback invoked when either peer sends
    /// `custom_command`.
    pub fn set_custom_command_callback(&self, callback: impl FnMut(&mut U, Vec<Val>) + Send + 'static) {
        self.inner.lock().callbacks.custom_command = Some(Box::new(callback));
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, TcpListener as StdTcpListener};

    use super::*;

    #[test]
    fn status_is_connecting_before_first_attempt() {
        let client: Client<()> =
            Client::init(Ipv4Addr::LOCALHOST.into(), 1, ClientConfig::default(), ());
        assert_eq!(client.status(), ClientStatus::Connecting);
    }

    #[test]
    fn connecting_to_a_live_listener_starts_the_handshake() {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let client: Client<()> =
            Client::init(Ipv4Addr::LOCALHOST.into(), port, ClientConfig::default(), ());
        let now = Instant::now();
        client.update(now).expect("first update attempts connect");
        assert_ne!(client.status(), ClientStatus::Connecting);
    }

    #[test]
    fn reconnect_is_not_attempted_before_the_delay_elapses() {
        // Port 0 makes `connect()` fail synchronously, so the client never
        // actually becomes connected and stays in the reconnect-gating path.
        let config = ClientConfig { reconnect_delay: Duration::from_secs(3600), ..ClientConfig::default() };
        let client: Client<()> = Client::init(Ipv4Addr::LOCALHOST.into(), 0, config, ());
        let now = Instant::now();
        client.update(now).expect("first attempt records last_attempt");
        assert_eq!(client.status(), ClientStatus::Connecting);

        let attempts_before = client.inner.lock().last_attempt;
        client.update(now + Duration::from_millis(1)).expect("second update, too soon to retry");
        assert_eq!(client.inner.lock().last_attempt, attempts_before, "too-soon update must not re-attempt");
    }

    #[test]
    fn outgoing_validation_rejects_malformed_payload() {
        let client: Client<()> =
            Client::init(Ipv4Addr::LOCALHOST.into(), 1, ClientConfig::default(), ());
        let mut bad = Payload::new();
        bad.set_string("timeout", "soon").expect("new field");
        let err = client.inner.lock().process_outgoing(Message::new(Opcode::SoftStop, bad)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidOutgoing(_)));
    }

    #[test]
    fn shutdown_returns_to_connecting_and_clears_backoff() {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let config = ClientConfig { reconnect_delay: Duration::from_secs(3600), ..ClientConfig::default() };

        let client: Client<()> = Client::init(Ipv4Addr::LOCALHOST.into(), port, config, ());
        client.update(Instant::now()).expect("first attempt connects");
        assert_ne!(client.status(), ClientStatus::Connecting);

        client.shutdown();
        assert_eq!(client.status(), ClientStatus::Connecting);
        assert!(client.inner.lock().last_attempt.is_none(), "shutdown must clear the reconnect backoff");
    }

    #[test]
    fn logger_override_receives_lifecycle_events() {
        use std::sync::{Arc, Mutex as StdMutex};

        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let client: Client<()> = Client::init(Ipv4Addr::LOCALHOST.into(), port, ClientConfig::default(), ());
        let lines: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        client.set_logger(move |_level, message| sink.lock().expect("lock").push(message.to_string()));

        client.update(Instant::now()).expect("first attempt connects");
        assert!(lines.lock().expect("lock").iter().any(|line| line.contains("connecting")));
    }

    #[test]
    fn live_state_callback_receives_all_fields() {
        let client: Client<Option<(i32, i32, String)>> =
            Client::init(Ipv4Addr::LOCALHOST.into(), 1, ClientConfig::default(), None);
        client.set_live_state_callback(|data, players, max_players, name, _map, _mode, _version| {
            *data = Some((players, max_players, name));
        });

        let message = builders::live_state(4, 16, "server-1", "de_dust2", "competitive", "1.0");

        let mut inner = client.inner.lock();
        let callbacks = &mut inner.callbacks;
        let user_data = &mut inner.user_data;
        dispatch(&message, callbacks, user_data);
        assert_eq!(*user_data, Some((4, 16, "server-1".to_string())));
    }
}
