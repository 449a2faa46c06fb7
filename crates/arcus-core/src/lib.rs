//! Connection state machine, byte/message rings, and non-blocking sockets
//! for the Arcus protocol.
//!
//! This crate drives the wire protocol defined by `arcus-proto` end to end:
//! [`socket::Socket`] is a thin non-blocking TCP wrapper, [`ring::ByteRing`]
//! and [`queue::MessageQueue`] are the fixed-capacity buffers either side of
//! it, [`timer::IntervalTimer`] and [`health::HealthChecker`] track the
//! handshake deadline and heartbeat cadence, and [`connection::Connection`]
//! composes all of the above into the single state machine both
//! `arcus-server` and `arcus-client` drive with one `update()` call per
//! tick.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod error;
pub mod health;
pub mod log;
pub mod queue;
pub mod ring;
pub mod socket;
pub mod timer;

pub use connection::{Connection, ConnectionConfig, ConnectionState};
pub use error::{ConnectionError, QueueError, SocketError};
pub use health::HealthChecker;
pub use log::LogLevel;
pub use queue::MessageQueue;
pub use ring::ByteRing;
pub use socket::Socket;
pub use timer::IntervalTimer;
