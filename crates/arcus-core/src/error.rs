//! Error taxonomy for sockets, queues, and the connection state machine.

use thiserror::Error;

/// Errors from the non-blocking socket layer.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The socket has not been initialized (bound/connected) yet.
    #[error("socket is uninitialized")]
    Uninitialized,

    /// The underlying OS call failed.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A queue push or pop could not complete right now.
///
/// Not a fault in itself - the byte ring and message queue are fixed
/// capacity and fail fast rather than block or grow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has no free capacity for another entry.
    #[error("queue is full")]
    Full,
    /// The queue has nothing to return.
    #[error("queue is empty")]
    Empty,
}

/// Errors surfaced by [`crate::connection::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// An operation was attempted before the connection was initialized.
    #[error("connection is uninitialized")]
    Uninitialized,

    /// `update()` was called again after the connection had already entered
    /// the terminal error state.
    #[error("update() called after the connection errored")]
    UpdateAfterError,

    /// The peer did not complete the handshake within the configured
    /// timeout.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// The peer went silent for longer than the configured health interval.
    #[error("peer health timeout after {0:?}")]
    HealthTimeout(std::time::Duration),

    /// The Hello packet received from the peer was malformed.
    #[error("invalid hello: {0}")]
    HelloInvalid(#[source] arcus_proto::ProtocolError),

    /// More bytes arrived claiming to be a Hello than the fixed Hello size.
    #[error("hello packet too large")]
    HelloTooBig,

    /// Application data arrived before the handshake completed.
    #[error("received application bytes before handshake completed")]
    ReceiveBeforeSend,

    /// The incoming message queue had no room for a newly decoded message.
    #[error("incoming message queue is full")]
    IncomingQueueFull,

    /// The outgoing message queue had no room for a newly enqueued message.
    #[error("outgoing message queue is full")]
    OutgoingQueueFull,

    /// A pop was attempted against an empty queue.
    #[error("queue is empty")]
    QueueEmpty,

    /// An outgoing message's encoded size exceeds what the byte ring can
    /// hold.
    #[error("outgoing message of {0} bytes cannot fit in the send stream")]
    OutMessageTooBigForStream(usize),

    /// The socket reported a status this build does not know how to
    /// interpret.
    #[error("unknown socket status")]
    UnknownStatus,

    /// A protocol-level decode/encode error.
    #[error("protocol error: {0}")]
    Protocol(#[from] arcus_proto::ProtocolError),

    /// A socket-level error.
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),
}

impl ConnectionError {
    /// Whether this error leaves the connection usable (the caller may keep
    /// driving `update()`) rather than forcing it into the terminal `error`
    /// state.
    ///
    /// Only the two timeout variants are treated as non-fatal by the state
    /// machine in the sense that they are the *expected* reason a connection
    /// tears down under normal operation, not a bug; the connection still
    /// transitions to the terminal state, callers simply should not log them
    /// as loudly as a protocol violation.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::HandshakeTimeout(_) | Self::HealthTimeout(_))
    }
}

/// Internal signal meaning "the operation would have blocked; try again
/// later". Never surfaced through a public `Result` - callers see it folded
/// into control flow (e.g. treated as "no bytes available this tick").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TryAgain;
