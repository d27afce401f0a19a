//! Connection
//!
//! Owns one established TCP stream and exchanges discrete messages over
//! it. Reads reconstruct message boundaries by quiescence detection:
//! after the first chunk arrives, the stream is polled with a short
//! timeout, and a window with no further bytes marks the message as
//! complete.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::config::Config;
use crate::error::{Result, WireError};

/// Receive buffer size for each chunk read off the stream.
const READ_CHUNK: usize = 4096;

/// Externally visible lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created but never connected
    Unconnected,
    /// Stream established, read/write are valid
    Connected,
    /// Disconnected; terminal, cannot be reconnected
    Closed,
}

/// The owned transport handle behind a Connection.
///
/// The stream is exclusively owned and never shared; Closed is terminal.
enum Endpoint {
    Unconnected,
    Connected(TcpStream),
    Closed,
}

/// A message-oriented wrapper around one TCP stream.
///
/// Reads and writes issued by the caller are strictly ordered; the
/// Connection has no internal concurrency. Dropping a Connection
/// disconnects it if still open.
pub struct Connection {
    endpoint: Endpoint,

    /// Bound for connect and for the first chunk of a read
    timeout: Duration,

    /// Quiescence threshold for the trailing reads of a message
    quiet_window: Duration,

    /// Log internal failures at warn instead of trace
    debug: bool,
}

impl Connection {
    /// Create an unconnected Connection; call [`connect`](Self::connect)
    /// before reading or writing.
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: Endpoint::Unconnected,
            timeout: config.timeout,
            quiet_window: config.effective_quiet_window(),
            debug: config.debug,
        }
    }

    /// Wrap an already-established stream (server side: the result of an
    /// accept) as a Connected Connection.
    pub fn from_stream(stream: TcpStream, config: &Config) -> Result<Self> {
        Self::configure_stream(&stream)?;
        Ok(Self {
            endpoint: Endpoint::Connected(stream),
            timeout: config.timeout,
            quiet_window: config.effective_quiet_window(),
            debug: config.debug,
        })
    }

    /// Socket setup shared by connect and from_stream.
    fn configure_stream(stream: &TcpStream) -> Result<()> {
        // Accepted sockets inherit O_NONBLOCK from the listener on some
        // platforms; reads here rely on blocking mode plus timeouts.
        stream.set_nonblocking(false)?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        Ok(())
    }

    /// Establish a connection to `(host, port)` within the configured
    /// timeout.
    ///
    /// Every address the name resolves to is attempted in order; the
    /// last failure is returned if none succeeds. On failure the
    /// Connection stays Unconnected and may be retried.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        match self.endpoint {
            Endpoint::Connected(_) => return Err(self.fail("connect", WireError::AlreadyConnected)),
            Endpoint::Closed => return Err(self.fail("connect", WireError::Closed)),
            Endpoint::Unconnected => {}
        }

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| self.fail("connect", e.into()))?;

        let mut last_err: Option<WireError> = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    Self::configure_stream(&stream)?;
                    self.endpoint = Endpoint::Connected(stream);
                    tracing::debug!(%addr, "connected");
                    return Ok(());
                }
                Err(e) => last_err = Some(e.into()),
            }
        }

        let err = last_err.unwrap_or_else(|| WireError::Resolve(format!("{host}:{port}")));
        Err(self.fail("connect", err))
    }

    /// Receive one message, bounded by the configured timeout.
    ///
    /// See [`read_with_timeout`](Self::read_with_timeout) for the
    /// boundary-reconstruction algorithm and the error contract.
    pub fn read(&mut self) -> Result<Bytes> {
        let timeout = self.timeout;
        self.read_with_timeout(timeout)
    }

    /// Receive one message, with `timeout` overriding the configured
    /// bound for the first chunk of this call only.
    ///
    /// The first receive blocks up to `timeout`; nothing in time is
    /// `Err(Timeout)`, an orderly close before any bytes is
    /// `Err(PeerClosed)`. Once bytes have arrived, the stream is polled
    /// with the quiet window as the bound; a window with no further
    /// bytes means the message is complete and the accumulated payload
    /// is returned. An orderly close after bytes have arrived also
    /// completes the message (the peer finished sending and hung up),
    /// while an abortive transport error at any point is `Err(Io)`.
    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<Bytes> {
        let quiet_window = self.quiet_window;
        let debug = self.debug;
        let stream = match &mut self.endpoint {
            Endpoint::Connected(stream) => stream,
            _ => return Err(fail(debug, "read", WireError::NotConnected)),
        };

        let mut chunk = [0u8; READ_CHUNK];
        let mut payload = BytesMut::with_capacity(READ_CHUNK);

        // First chunk: block up to the effective timeout.
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| fail(debug, "read", e.into()))?;
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Err(fail(debug, "read", WireError::PeerClosed)),
                Ok(n) => {
                    payload.extend_from_slice(&chunk[..n]);
                    break;
                }
                Err(ref e) if is_timeout_kind(e.kind()) => {
                    return Err(fail(debug, "read", WireError::Timeout))
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(fail(debug, "read", e.into())),
            }
        }

        // Trailing chunks: poll until the wire goes quiet.
        stream
            .set_read_timeout(Some(quiet_window))
            .map_err(|e| fail(debug, "read", e.into()))?;
        loop {
            match stream.read(&mut chunk) {
                // Peer finished sending and closed; the message is whole.
                Ok(0) => break,
                Ok(n) => payload.extend_from_slice(&chunk[..n]),
                // Quiet window elapsed with no further bytes.
                Err(ref e) if is_timeout_kind(e.kind()) => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(fail(debug, "read", e.into())),
            }
        }

        Ok(payload.freeze())
    }

    /// Send one payload in full, looping over partial sends.
    ///
    /// Accepts anything byte-like; `&str` and `String` encode as UTF-8.
    /// Either every byte is handed to the transport or an error is
    /// returned.
    pub fn write(&mut self, payload: impl AsRef<[u8]>) -> Result<()> {
        let debug = self.debug;
        let stream = match &mut self.endpoint {
            Endpoint::Connected(stream) => stream,
            _ => return Err(fail(debug, "write", WireError::NotConnected)),
        };

        stream
            .write_all(payload.as_ref())
            .map_err(|e| fail(debug, "write", e.into()))
    }

    /// Shut down both directions of the stream and release it.
    ///
    /// Idempotent: calling on an Unconnected or already Closed
    /// connection is a no-op. Never errors; shutdown failures on a
    /// dying socket are ignored.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.endpoint, Endpoint::Closed) {
            Endpoint::Connected(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                tracing::debug!("disconnected");
            }
            // Never connected; leave it eligible for connect().
            Endpoint::Unconnected => self.endpoint = Endpoint::Unconnected,
            Endpoint::Closed => {}
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        match self.endpoint {
            Endpoint::Unconnected => ConnectionState::Unconnected,
            Endpoint::Connected(_) => ConnectionState::Connected,
            Endpoint::Closed => ConnectionState::Closed,
        }
    }

    /// True while read/write are valid.
    pub fn is_connected(&self) -> bool {
        matches!(self.endpoint, Endpoint::Connected(_))
    }

    /// Address of the remote peer, when connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.endpoint {
            Endpoint::Connected(stream) => stream.peer_addr().ok(),
            _ => None,
        }
    }

    fn fail(&self, op: &'static str, err: WireError) -> WireError {
        fail(self.debug, op, err)
    }
}

impl Drop for Connection {
    /// Connections never leak their socket: any exit path that drops the
    /// value disconnects it first.
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("timeout", &self.timeout)
            .field("quiet_window", &self.quiet_window)
            .finish()
    }
}

/// Log an internal failure and hand the error back for returning.
fn fail(debug: bool, op: &'static str, err: WireError) -> WireError {
    if debug {
        tracing::warn!(op, error = %err, "connection failure");
    } else {
        tracing::trace!(op, error = %err, "connection failure");
    }
    err
}

/// Read timeouts surface as WouldBlock on Unix and TimedOut on Windows.
fn is_timeout_kind(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
