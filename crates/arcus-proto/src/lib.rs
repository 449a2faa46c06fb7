//! Wire format, opcode registry, and the JSON payload DOM for the Arcus
//! protocol.
//!
//! This crate has no knowledge of sockets, threads, or connection state - it
//! is pure encoding/decoding and the data model those operations share. The
//! connection state machine built on top of it lives in `arcus-core`.
//!
//! # Wire format
//!
//! A handshake greeting ([`hello::Hello`]) is exchanged raw before any
//! framed traffic. After that, every message is a [`header::Header`]
//! immediately followed by its JSON payload bytes, as built by
//! [`codec::message_to_bytes`] and parsed by [`codec::message_from_bytes`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod builders;
pub mod codec;
pub mod error;
pub mod header;
pub mod hello;
pub mod message;
pub mod opcode;
pub mod payload;
pub mod schema;

pub use error::{ProtocolError, Result};
pub use header::Header;
pub use hello::Hello;
pub use message::Message;
pub use opcode::Opcode;
pub use payload::{Payload, Val};
