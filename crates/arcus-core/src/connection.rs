//! The connection state machine: owns a [`Socket`] and drives the handshake,
//! health keepalive, and message pumps directly against it.
//!
//! Unlike a typical action-returning state machine, `Connection` performs its
//! own I/O. The protocol's handshake and backpressure rules are specified in
//! terms of "read/write this many bytes right now", which only makes sense
//! if something owns the socket end to end; splitting that across a pure
//! core and an outer I/O driver would just relocate the same socket calls
//! one layer up without changing what they do. Construction, queue/ring
//! sizing, and the timer composition all follow the same shapes used
//! elsewhere in this crate.

use std::time::{Duration, Instant};

use arcus_proto::{codec, header, hello, Header, Hello, Message, Opcode, ProtocolError};

use crate::error::ConnectionError;
use crate::health::HealthChecker;
use crate::queue::MessageQueue;
use crate::ring::ByteRing;
use crate::socket::{IoProgress, Socket};

/// Default maximum time to wait for the handshake to complete.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Default capacity, in messages, of each of the incoming/outgoing queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default capacity, in bytes, of each of the incoming/outgoing byte rings.
///
/// Must hold at least one complete frame (`header::SIZE + header::PAYLOAD_MAX`).
pub const DEFAULT_RING_CAPACITY: usize = 4 * (header::SIZE + header::PAYLOAD_MAX);

/// Tunables for a [`Connection`]. `..Default::default()` covers the common
/// case; only tests and unusual deployments need to set these explicitly.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Capacity, in messages, of the incoming queue.
    pub incoming_capacity: usize,
    /// Capacity, in messages, of the outgoing queue.
    pub outgoing_capacity: usize,
    /// Capacity, in bytes, of each byte ring. Must be at least
    /// `header::SIZE + header::PAYLOAD_MAX`.
    pub ring_capacity: usize,
    /// How long the handshake may run before the connection errors out.
    pub handshake_timeout: Duration,
    /// How often this side sends a `Health` heartbeat once ready.
    pub health_send_interval: Duration,
    /// How long the peer may stay silent before it is considered gone.
    pub health_receive_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            incoming_capacity: DEFAULT_QUEUE_CAPACITY,
            outgoing_capacity: DEFAULT_QUEUE_CAPACITY,
            ring_capacity: DEFAULT_RING_CAPACITY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            health_send_interval: crate::health::DEFAULT_SEND_INTERVAL,
            health_receive_interval: crate::health::DEFAULT_RECEIVE_INTERVAL,
        }
    }
}

/// Where a [`Connection`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `init()` has not been called, or `shutdown()` has been called since.
    Uninitialized,
    /// Initialized; waiting to either receive a raw Hello (passive side) or
    /// be told to initiate one (`initiate_handshake()`).
    HandshakeNotStarted,
    /// `initiate_handshake()` has been called; about to confirm silence and
    /// send the raw Hello.
    HandshakeHelloScheduled,
    /// The raw Hello has been fully written; waiting for the framed
    /// hello-opcode acknowledgement.
    HandshakeHelloSent,
    /// A valid raw Hello has been received; about to send the framed
    /// acknowledgement.
    HandshakeHelloReceived,
    /// Handshake complete. Application messages flow in both directions.
    Ready,
    /// Terminal. Something about the connection or peer was invalid;
    /// `update()` will keep returning [`ConnectionError::UpdateAfterError`]
    /// until `shutdown()` is called.
    Error,
}

/// Owns a socket plus the queues and rings either side of it, and drives the
/// handshake, health keepalive, and message pumps one `update()` at a time.
///
/// # Roles
///
/// This design makes the server the Hello initiator: the server calls
/// [`Self::initiate_handshake`] right after installing a freshly accepted
/// peer socket, sends the raw [`Hello`], and waits for a framed
/// acknowledgement. The client installs its socket and stays in
/// `handshake_not_started`, passively waiting to receive that raw `Hello`
/// before replying with the framed acknowledgement itself. Calling
/// `initiate_handshake()` on the client side (or not calling it on the
/// server side) simply means the handshake never leaves
/// `handshake_not_started`/times out - nothing enforces role at the type
/// level.
pub struct Connection {
    socket: Option<Socket>,
    state: ConnectionState,
    in_ring: ByteRing,
    out_ring: ByteRing,
    in_queue: MessageQueue,
    out_queue: MessageQueue,
    handshake_deadline: Option<Instant>,
    health: Option<HealthChecker>,
    packet_id: u32,
    config: ConnectionConfig,
}

impl Connection {
    /// Builds an uninitialized connection. Call [`Self::init`] before
    /// driving it.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            socket: None,
            state: ConnectionState::Uninitialized,
            in_ring: ByteRing::with_capacity(config.ring_capacity),
            out_ring: ByteRing::with_capacity(config.ring_capacity),
            in_queue: MessageQueue::with_capacity(config.incoming_capacity),
            out_queue: MessageQueue::with_capacity(config.outgoing_capacity),
            handshake_deadline: None,
            health: None,
            packet_id: 0,
            config,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Installs `socket` and transitions to `handshake_not_started`.
    ///
    /// Resets the handshake deadline and the health checker's receive timer
    /// relative to `now`. Must be called before [`Self::update`] or
    /// [`Self::initiate_handshake`].
    pub fn init(&mut self, socket: Socket, now: Instant) {
        self.socket = Some(socket);
        self.state = ConnectionState::HandshakeNotStarted;
        self.handshake_deadline = Some(now + self.config.handshake_timeout);
        self.health = Some(HealthChecker::new(
            self.config.health_send_interval,
            self.config.health_receive_interval,
            now,
        ));
        self.packet_id = 0;
    }

    /// Marks this side as the Hello initiator. Server-side entry point,
    /// called once right after [`Self::init`].
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Uninitialized`] unless the connection is currently
    /// in `handshake_not_started`.
    pub fn initiate_handshake(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::HandshakeNotStarted {
            return Err(ConnectionError::Uninitialized);
        }
        self.state = ConnectionState::HandshakeHelloScheduled;
        Ok(())
    }

    /// Enqueues `message` to be sent on a future `update()`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Uninitialized`] if not yet initialized,
    /// [`ConnectionError::OutgoingQueueFull`] if the outgoing queue is at
    /// capacity.
    pub fn add_outgoing(&mut self, message: Message) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Uninitialized {
            return Err(ConnectionError::Uninitialized);
        }
        self.out_queue.push(message).map_err(|_| ConnectionError::OutgoingQueueFull)
    }

    /// Number of fully decoded messages waiting in the incoming queue.
    #[must_use]
    pub fn incoming_count(&self) -> usize {
        self.in_queue.len()
    }

    /// Pops the oldest incoming message and hands it to `handler`.
    ///
    /// `handler`'s error, if any, is returned as-is - it is not folded into
    /// the connection's error state, since a callback rejecting one message
    /// is an application concern, not a transport fault.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::QueueEmpty`] if nothing is queued. Otherwise,
    /// whatever `handler` returns.
    pub fn remove_incoming<F>(&mut self, handler: F) -> Result<(), ConnectionError>
    where
        F: FnOnce(&Message) -> Result<(), ConnectionError>,
    {
        let message = self.in_queue.pop().map_err(|_| ConnectionError::QueueEmpty)?;
        handler(&message)
    }

    /// Tears the connection down: drops the socket, clears both rings and
    /// queues, and returns to `uninitialized`.
    pub fn shutdown(&mut self) {
        if let Some(socket) = self.socket.as_mut() {
            socket.close();
        }
        self.socket = None;
        self.in_ring.clear();
        self.out_ring.clear();
        self.in_queue = MessageQueue::with_capacity(self.config.incoming_capacity);
        self.out_queue = MessageQueue::with_capacity(self.config.outgoing_capacity);
        self.handshake_deadline = None;
        self.health = None;
        self.state = ConnectionState::Uninitialized;
    }

    fn fail(&mut self, err: ConnectionError) -> ConnectionError {
        self.state = ConnectionState::Error;
        err
    }

    fn socket_mut(&mut self) -> Result<&mut Socket, ConnectionError> {
        self.socket.as_mut().ok_or(ConnectionError::Uninitialized)
    }

    /// Runs one round of I/O.
    ///
    /// In `ready`, this checks peer silence, queues a heartbeat if due, and
    /// pumps both directions. In any handshake state, it advances exactly
    /// one handshake substep. All reads/writes are partial-safe: a short
    /// write leaves its residue in the out-ring for the next `update()` to
    /// continue flushing.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Uninitialized`] if `init()` was never called.
    /// [`ConnectionError::UpdateAfterError`] if called again after the
    /// connection already entered `error`. Any protocol, queue, or socket
    /// fault transitions the connection to `error` and is returned.
    pub fn update(&mut self, now: Instant) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Uninitialized => return Err(ConnectionError::Uninitialized),
            ConnectionState::Error => return Err(ConnectionError::UpdateAfterError),
            _ => {}
        }

        if self.state == ConnectionState::Ready {
            self.run_health(now)?;
        }

        let writable = self.socket_mut()?.ready_for_send(Duration::ZERO).map_err(|e| self.fail(e.into()))?;
        if !writable {
            return Ok(());
        }

        if self.state != ConnectionState::Ready {
            return self.step_handshake(now);
        }

        self.pump_outgoing()?;
        self.pump_incoming(now)?;
        Ok(())
    }

    fn run_health(&mut self, now: Instant) -> Result<(), ConnectionError> {
        let Some(health) = self.health.as_mut() else {
            return Err(self.fail(ConnectionError::Uninitialized));
        };
        if health.is_peer_silent(now) {
            return Err(self.fail(ConnectionError::HealthTimeout(self.config.health_receive_interval)));
        }
        if health.should_send(now) && self.out_queue.push(Message::new(Opcode::Health, arcus_proto::Payload::new())).is_ok()
        {
            if let Some(health) = self.health.as_mut() {
                health.reset_send_timer(now);
            }
        }
        Ok(())
    }

    fn step_handshake(&mut self, now: Instant) -> Result<(), ConnectionError> {
        if let Some(deadline) = self.handshake_deadline {
            if now >= deadline {
                return Err(self.fail(ConnectionError::HandshakeTimeout(self.config.handshake_timeout)));
            }
        }
        match self.state {
            ConnectionState::HandshakeNotStarted => self.handshake_wait_for_raw_hello(now),
            ConnectionState::HandshakeHelloReceived => self.handshake_send_hello_ack(),
            ConnectionState::HandshakeHelloScheduled => self.handshake_send_raw_hello(),
            ConnectionState::HandshakeHelloSent => self.handshake_wait_for_hello_ack(now),
            ConnectionState::Ready | ConnectionState::Uninitialized | ConnectionState::Error => Ok(()),
        }
    }

    fn ensure_nothing_received(&mut self) -> Result<(), ConnectionError> {
        let mut probe = [0u8; 1];
        let progress = self.socket_mut()?.receive(&mut probe).map_err(|e| self.fail(e.into()))?;
        match progress {
            IoProgress::Complete(0) | IoProgress::WouldBlock => Ok(()),
            IoProgress::Complete(_) => Err(self.fail(ConnectionError::ReceiveBeforeSend)),
        }
    }

    fn fill_in_ring(&mut self, now: Instant) -> Result<(), ConnectionError> {
        let free = self.in_ring.free_capacity();
        if free == 0 {
            return Ok(());
        }
        let mut buf = vec![0u8; free];
        let progress = self.socket_mut()?.receive(&mut buf).map_err(|e| self.fail(e.into()))?;
        if let IoProgress::Complete(n) = progress {
            if n > 0 {
                self.in_ring.put(&buf[..n]);
                if let Some(health) = self.health.as_mut() {
                    health.reset_receive_timer(now);
                }
            }
        }
        Ok(())
    }

    fn flush_out_ring(&mut self) -> Result<(), ConnectionError> {
        let pending = self.out_ring.len();
        if pending == 0 {
            return Ok(());
        }
        let mut buf = vec![0u8; pending];
        self.out_ring.peek(&mut buf);
        let progress = self.socket_mut()?.send(&buf).map_err(|e| self.fail(e.into()))?;
        if let IoProgress::Complete(n) = progress {
            self.out_ring.trim(n);
        }
        Ok(())
    }

    fn handshake_wait_for_raw_hello(&mut self, now: Instant) -> Result<(), ConnectionError> {
        self.fill_in_ring(now)?;
        if self.in_ring.len() < hello::SIZE {
            return Ok(());
        }
        let mut buf = [0u8; hello::SIZE];
        self.in_ring.peek(&mut buf);
        Hello::decode(&buf).map_err(|e| self.fail(ConnectionError::HelloInvalid(e)))?;
        self.in_ring.trim(hello::SIZE);
        if let Some(health) = self.health.as_mut() {
            health.reset_receive_timer(now);
        }
        self.state = ConnectionState::HandshakeHelloReceived;
        Ok(())
    }

    fn handshake_send_hello_ack(&mut self) -> Result<(), ConnectionError> {
        if self.out_ring.is_empty() {
            let ack = Header::new(Opcode::Hello, 0, 0).encode();
            if !self.out_ring.put(&ack) {
                return Err(self.fail(ConnectionError::OutMessageTooBigForStream(ack.len())));
            }
        }
        self.flush_out_ring()?;
        if self.out_ring.is_empty() {
            self.state = ConnectionState::Ready;
        }
        Ok(())
    }

    fn handshake_send_raw_hello(&mut self) -> Result<(), ConnectionError> {
        self.ensure_nothing_received()?;
        if self.out_ring.is_empty() {
            let hello = Hello::current().encode();
            if !self.out_ring.put(&hello) {
                return Err(self.fail(ConnectionError::OutMessageTooBigForStream(hello.len())));
            }
        }
        self.flush_out_ring()?;
        if self.out_ring.is_empty() {
            self.state = ConnectionState::HandshakeHelloSent;
        }
        Ok(())
    }

    fn handshake_wait_for_hello_ack(&mut self, now: Instant) -> Result<(), ConnectionError> {
        self.fill_in_ring(now)?;
        if self.in_ring.len() < header::SIZE {
            return Ok(());
        }
        let mut buf = [0u8; header::SIZE];
        self.in_ring.peek(&mut buf);
        let head = Header::decode(&buf).map_err(|e| self.fail(e.into()))?;
        if head.opcode() != Opcode::Hello || head.length() != 0 {
            return Err(self.fail(ConnectionError::Protocol(ProtocolError::UnsupportedOpcode(head.opcode()))));
        }
        self.in_ring.trim(header::SIZE);
        if let Some(health) = self.health.as_mut() {
            health.reset_receive_timer(now);
        }
        self.state = ConnectionState::Ready;
        Ok(())
    }

    fn pump_outgoing(&mut self) -> Result<(), ConnectionError> {
        loop {
            let Some(message) = self.out_queue.peek_front() else { break };
            let attempt_id = self.packet_id.wrapping_add(1);
            let bytes = match codec::message_to_bytes(message, attempt_id) {
                Ok(bytes) => bytes,
                Err(ProtocolError::PayloadTooLarge { len, .. }) => {
                    return Err(self.fail(ConnectionError::OutMessageTooBigForStream(len)));
                }
                Err(e) => return Err(self.fail(e.into())),
            };
            if bytes.len() > self.out_ring.capacity() {
                return Err(self.fail(ConnectionError::OutMessageTooBigForStream(bytes.len())));
            }
            if bytes.len() > self.out_ring.free_capacity() {
                break;
            }
            self.packet_id = attempt_id;
            let _ = self.out_queue.pop();
            self.out_ring.put(&bytes);
        }
        self.flush_out_ring()
    }

    fn pump_incoming(&mut self, now: Instant) -> Result<(), ConnectionError> {
        self.fill_in_ring(now)?;
        loop {
            let mut available = vec![0u8; self.in_ring.len()];
            self.in_ring.peek(&mut available);
            match codec::message_from_bytes(&available) {
                Ok((message, consumed)) => {
                    self.in_ring.trim(consumed);
                    if message.opcode().is_framing_reserved() {
                        continue;
                    }
                    if self.in_queue.push(message).is_err() {
                        return Err(self.fail(ConnectionError::IncomingQueueFull));
                    }
                }
                Err(ProtocolError::Incomplete { .. }) => break,
                Err(e) => return Err(self.fail(e.into())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener as StdTcpListener;

    use arcus_proto::Payload;

    use super::*;

    fn connected_pair() -> (std::net::TcpStream, std::net::TcpStream) {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let client = std::net::TcpStream::connect(addr).expect("connect");
        let (server, _) = listener.accept().expect("accept");
        server.set_nonblocking(true).expect("nonblocking");
        client.set_nonblocking(true).expect("nonblocking");
        (server, client)
    }

    fn socket_from_std(stream: std::net::TcpStream) -> Socket {
        let mio_stream = mio::net::TcpStream::from_std(stream);
        let mut socket = Socket::new().expect("poller");
        socket.adopt_stream(mio_stream).expect("register adopted stream");
        socket
    }

    #[test]
    fn server_initiated_handshake_reaches_ready_on_both_sides() {
        let (server_raw, client_raw) = connected_pair();
        let now = Instant::now();

        let mut server = Connection::new(ConnectionConfig::default());
        server.init(socket_from_std(server_raw), now);
        server.initiate_handshake().expect("server starts handshake");

        let mut client = Connection::new(ConnectionConfig::default());
        client.init(socket_from_std(client_raw), now);

        for _ in 0..8 {
            let _ = server.update(now);
            let _ = client.update(now);
            if server.state() == ConnectionState::Ready && client.state() == ConnectionState::Ready {
                break;
            }
        }

        assert_eq!(server.state(), ConnectionState::Ready);
        assert_eq!(client.state(), ConnectionState::Ready);
    }

    #[test]
    fn handshake_times_out_if_peer_never_responds() {
        let (server_raw, _client_raw) = connected_pair();
        let now = Instant::now();
        let config = ConnectionConfig { handshake_timeout: Duration::from_millis(1), ..Default::default() };
        let mut server = Connection::new(config);
        server.init(socket_from_std(server_raw), now);
        server.initiate_handshake().expect("start handshake");

        let later = now + Duration::from_secs(1);
        let err = server.update(later).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(server.state(), ConnectionState::Error);
    }

    #[test]
    fn add_outgoing_before_init_fails() {
        let mut connection = Connection::new(ConnectionConfig::default());
        let err = connection.add_outgoing(Message::new(Opcode::LiveState, Payload::new())).unwrap_err();
        assert!(matches!(err, ConnectionError::Uninitialized));
    }

    #[test]
    fn remove_incoming_on_empty_queue_fails() {
        let mut connection = Connection::new(ConnectionConfig::default());
        let err = connection.remove_incoming(|_| Ok(())).unwrap_err();
        assert!(matches!(err, ConnectionError::QueueEmpty));
    }

    #[test]
    fn shutdown_returns_to_uninitialized_and_clears_state() {
        let (server_raw, _client_raw) = connected_pair();
        let now = Instant::now();
        let mut connection = Connection::new(ConnectionConfig::default());
        connection.init(socket_from_std(server_raw), now);
        connection.shutdown();
        assert_eq!(connection.state(), ConnectionState::Uninitialized);
        assert_eq!(connection.incoming_count(), 0);
    }

    #[test]
    fn ready_connection_pumps_an_application_message_end_to_end() {
        let (server_raw, client_raw) = connected_pair();
        let now = Instant::now();

        let mut server = Connection::new(ConnectionConfig::default());
        server.init(socket_from_std(server_raw), now);
        server.initiate_handshake().expect("server starts handshake");

        let mut client = Connection::new(ConnectionConfig::default());
        client.init(socket_from_std(client_raw), now);

        for _ in 0..8 {
            let _ = server.update(now);
            let _ = client.update(now);
        }
        assert_eq!(server.state(), ConnectionState::Ready);
        assert_eq!(client.state(), ConnectionState::Ready);

        let mut payload = Payload::new();
        payload.set_int("players", 2).expect("new field");
        server.add_outgoing(Message::new(Opcode::LiveState, payload)).expect("enqueue");

        for _ in 0..4 {
            let _ = server.update(now);
            let _ = client.update(now);
        }

        assert_eq!(client.incoming_count(), 1);
        client
            .remove_incoming(|message| {
                assert_eq!(message.opcode(), Opcode::LiveState);
                assert_eq!(message.payload().int_val("players").expect("int"), 2);
                Ok(())
            })
            .expect("deliver");
    }

    #[test]
    fn health_messages_never_reach_the_incoming_queue() {
        let (server_raw, client_raw) = connected_pair();
        let now = Instant::now();
        let config = ConnectionConfig {
            health_send_interval: Duration::from_millis(1),
            health_receive_interval: Duration::from_secs(3600),
            ..Default::default()
        };

        let mut server = Connection::new(config);
        server.init(socket_from_std(server_raw), now);
        server.initiate_handshake().expect("server starts handshake");

        let mut client = Connection::new(config);
        client.init(socket_from_std(client_raw), now);

        for _ in 0..8 {
            let _ = server.update(now);
            let _ = client.update(now);
        }

        let later = now + Duration::from_secs(1);
        for _ in 0..4 {
            let _ = server.update(later);
            let _ = client.update(later);
        }

        assert_eq!(client.incoming_count(), 0, "heartbeats must not surface to the application");
    }

}
