//! Errors surfaced by [`crate::Server`].

use thiserror::Error;

/// Errors from the server's public surface.
#[derive(Debug, Error)]
pub enum ServerError {
    /// An outgoing message's payload does not match the schema its opcode
    /// requires; the message was not enqueued.
    #[error("outgoing message failed schema validation: {0}")]
    InvalidOutgoing(#[source] arcus_proto::ProtocolError),

    /// The accepted peer's [`arcus_core::Connection`] rejected the message
    /// outright (queue full, message too big for the stream, ...).
    #[error("connection rejected outgoing message: {0}")]
    Connection(#[from] arcus_core::ConnectionError),

    /// Binding or accepting on the listening socket failed.
    #[error("listen socket error: {0}")]
    Socket(#[from] arcus_core::SocketError),
}
