//! Errors surfaced by [`crate::Client`].

use thiserror::Error;

/// Errors from the client's public surface.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An outgoing message's payload does not match the schema its opcode
    /// requires; the message was not enqueued.
    #[error("outgoing message failed schema validation: {0}")]
    InvalidOutgoing(#[source] arcus_proto::ProtocolError),

    /// The connection rejected the message outright (queue full, message
    /// too big for the stream, ...).
    #[error("connection rejected outgoing message: {0}")]
    Connection(#[from] arcus_core::ConnectionError),

    /// Connecting, or building the readiness poller, failed at the socket
    /// layer.
    #[error("socket error: {0}")]
    Socket(#[from] arcus_core::SocketError),
}
