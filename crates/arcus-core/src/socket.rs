//! Non-blocking TCP socket wrapper.
//!
//! Wraps `mio`'s non-blocking `TcpListener`/`TcpStream` behind the readiness
//! probe + partial I/O surface [`crate::connection::Connection`] drives: a
//! socket never blocks, readiness is checked explicitly before every
//! send/receive attempt, and partial progress is reported rather than masked.

use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use crate::error::{SocketError, TryAgain};

const TOKEN: Token = Token(0);

/// Process-wide socket subsystem reference count.
///
/// On the platforms this crate targets, `mio`/`std::net` need no bring-up
/// step analogous to Winsock's `WSAStartup`. This counter exists so the
/// `init`/`shutdown` calling convention (balanced calls; only the last
/// matching shutdown tears anything down) still works for an embedder that
/// calls it unconditionally before touching any [`Socket`].
static SOCKET_SYSTEM_REFS: AtomicUsize = AtomicUsize::new(0);

/// Registers one more user of the socket subsystem.
pub fn init() {
    SOCKET_SYSTEM_REFS.fetch_add(1, Ordering::SeqCst);
}

/// Unregisters one user of the socket subsystem.
pub fn shutdown() {
    SOCKET_SYSTEM_REFS.fetch_sub(1, Ordering::SeqCst);
}

/// The outcome of one non-blocking I/O attempt.
#[derive(Debug)]
pub enum IoProgress {
    /// The call completed immediately, transferring this many bytes.
    ///
    /// Zero is a valid, non-terminal outcome for `send`/`receive` on a
    /// ready-but-momentarily-empty non-blocking socket and is treated by
    /// callers the same as [`IoProgress::WouldBlock`].
    Complete(usize),
    /// The call would have blocked; no bytes were transferred.
    WouldBlock,
}

enum Kind {
    Listener(TcpListener),
    Stream(TcpStream),
}

/// A non-blocking TCP socket: a listener, a connector, or an already
/// connected peer stream, each with its own readiness poller.
pub struct Socket {
    kind: Option<Kind>,
    poll: Poll,
    events: Events,
}

impl Socket {
    /// Creates an uninitialized socket with its own readiness poller.
    ///
    /// # Errors
    ///
    /// Propagates any OS error from creating the underlying poller.
    pub fn new() -> Result<Self, SocketError> {
        Ok(Self { kind: None, poll: Poll::new()?, events: Events::with_capacity(8) })
    }

    /// Whether this socket has been bound, connected, or accepted into.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.kind.is_some()
    }

    fn register(&mut self) -> Result<(), SocketError> {
        match &mut self.kind {
            Some(Kind::Listener(listener)) => {
                self.poll.registry().register(listener, TOKEN, Interest::READABLE)?;
            }
            Some(Kind::Stream(stream)) => {
                self.poll.registry().register(
                    stream,
                    TOKEN,
                    Interest::READABLE | Interest::WRITABLE,
                )?;
            }
            None => return Err(SocketError::Uninitialized),
        }
        Ok(())
    }

    /// Binds a listening socket on all interfaces at `port` and starts
    /// listening with the given `backlog` hint.
    ///
    /// `backlog` is advisory: the standard library's `TcpListener::bind`
    /// already listens with the platform's default backlog, and nothing in
    /// this crate's dependency stack exposes a portable way to override it
    /// without an extra dependency this protocol does not otherwise need.
    ///
    /// # Errors
    ///
    /// Propagates any OS error from binding.
    pub fn bind_listener(&mut self, port: u16, _backlog: u32) -> Result<(), SocketError> {
        let addr: SocketAddr = (std::net::Ipv4Addr::UNSPECIFIED, port).into();
        let listener = TcpListener::bind(addr)?;
        self.kind = Some(Kind::Listener(listener));
        self.register()
    }

    /// Accepts one pending connection, if any.
    ///
    /// Returns `Ok(None)` rather than blocking when nothing is pending.
    ///
    /// # Errors
    ///
    /// [`SocketError::Uninitialized`] if this socket is not a listener. Any
    /// other OS error is propagated.
    pub fn accept(&mut self) -> Result<Option<(Self, SocketAddr)>, SocketError> {
        let Some(Kind::Listener(listener)) = &self.kind else {
            return Err(SocketError::Uninitialized);
        };
        match listener.accept() {
            Ok((stream, addr)) => {
                let mut peer = Self::new()?;
                peer.kind = Some(Kind::Stream(stream));
                peer.register()?;
                Ok(Some((peer, addr)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a non-blocking outbound connection to `ip:port`.
    ///
    /// The connection attempt is asynchronous: the stream is usable
    /// immediately, but callers should confirm the connection actually
    /// succeeded via [`Self::ready_for_send`] before relying on it.
    ///
    /// # Errors
    ///
    /// Propagates any OS error from the initial `connect` call.
    pub fn connect(&mut self, ip: IpAddr, port: u16) -> Result<(), SocketError> {
        let stream = TcpStream::connect(SocketAddr::new(ip, port))?;
        self.kind = Some(Kind::Stream(stream));
        self.register()
    }

    /// Closes this socket. Idempotent - closing an already-uninitialized or
    /// already-closed socket is a no-op.
    pub fn close(&mut self) {
        self.kind = None;
    }

    /// Adopts an already-connected `mio` stream as this socket's peer
    /// connection and registers it for readiness polling.
    ///
    /// Used by test harnesses that need a connected pair without going
    /// through a real `connect`/`accept` round trip (e.g. a loopback
    /// `std::net::TcpListener` pair converted via `TcpStream::from_std`).
    #[cfg(test)]
    pub(crate) fn adopt_stream(&mut self, stream: TcpStream) -> Result<(), SocketError> {
        self.kind = Some(Kind::Stream(stream));
        self.register()
    }

    fn poll_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool, SocketError> {
        if self.kind.is_none() {
            return Err(SocketError::Uninitialized);
        }
        self.poll.poll(&mut self.events, Some(timeout))?;
        Ok(self.events.iter().any(|event| {
            (interest.is_readable() && event.is_readable())
                || (interest.is_writable() && event.is_writable())
        }))
    }

    /// Probes whether this socket can accept a write without blocking.
    ///
    /// # Errors
    ///
    /// [`SocketError::Uninitialized`] if uninitialized. Any other OS error
    /// from the underlying poll is propagated.
    pub fn ready_for_send(&mut self, timeout: Duration) -> Result<bool, SocketError> {
        self.poll_ready(Interest::WRITABLE, timeout)
    }

    /// Probes whether this socket has data (or, for a listener, a pending
    /// connection) ready to read without blocking.
    ///
    /// # Errors
    ///
    /// [`SocketError::Uninitialized`] if uninitialized. Any other OS error
    /// from the underlying poll is propagated.
    pub fn ready_for_read(&mut self, timeout: Duration) -> Result<bool, SocketError> {
        self.poll_ready(Interest::READABLE, timeout)
    }

    fn write_once(stream: &mut TcpStream, buf: &[u8]) -> Result<std::result::Result<usize, TryAgain>, SocketError> {
        match stream.write(buf) {
            Ok(n) => Ok(Ok(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Err(TryAgain)),
            Err(e) => Err(e.into()),
        }
    }

    fn read_once(stream: &mut TcpStream, buf: &mut [u8]) -> Result<std::result::Result<usize, TryAgain>, SocketError> {
        match stream.read(buf) {
            Ok(n) => Ok(Ok(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Err(TryAgain)),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes as much of `buf` as the socket accepts without blocking.
    ///
    /// # Errors
    ///
    /// [`SocketError::Uninitialized`] if this socket holds no stream (a bare
    /// listener, or nothing at all). Any other OS error is propagated and is
    /// fatal - the caller should tear the connection down.
    pub fn send(&mut self, buf: &[u8]) -> Result<IoProgress, SocketError> {
        let Some(Kind::Stream(stream)) = &mut self.kind else {
            return Err(SocketError::Uninitialized);
        };
        match Self::write_once(stream, buf)? {
            Ok(n) => Ok(IoProgress::Complete(n)),
            Err(TryAgain) => Ok(IoProgress::WouldBlock),
        }
    }

    /// Reads as many bytes as are available without blocking, up to
    /// `buf.len()`.
    ///
    /// # Errors
    ///
    /// [`SocketError::Uninitialized`] if this socket holds no stream. Any
    /// other OS error is propagated and is fatal.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<IoProgress, SocketError> {
        let Some(Kind::Stream(stream)) = &mut self.kind else {
            return Err(SocketError::Uninitialized);
        };
        match Self::read_once(stream, buf)? {
            Ok(n) => Ok(IoProgress::Complete(n)),
            Err(TryAgain) => Ok(IoProgress::WouldBlock),
        }
    }
}
