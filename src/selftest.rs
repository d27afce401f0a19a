//! Self-test
//!
//! An in-process loopback check used to validate an installation: an
//! echo server and a client Connection exchange one fixed message.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Result;
use crate::server::{RunMode, Server};

/// The fixed message exchanged by [`self_test`].
pub const SELF_TEST_MESSAGE: &[u8] =
    b"If you see this message, that means quietwire is working!";

/// Reads one message from the peer, writes it back, and disconnects.
///
/// The handler used by [`self_test`] and the demo binary; also a minimal
/// example of the handler contract.
pub fn echo_handler(peer: SocketAddr, mut connection: Connection) {
    match connection.read() {
        Ok(message) => {
            if let Err(err) = connection.write(&message) {
                tracing::debug!(%peer, error = %err, "echo write failed");
            }
        }
        Err(err) => tracing::debug!(%peer, error = %err, "echo read failed"),
    }
    connection.disconnect();
}

/// Start a local echo server and Connection pair, exchange
/// [`SELF_TEST_MESSAGE`], and return the bytes the client received.
///
/// Uses an ephemeral port on 127.0.0.1; everything is torn down before
/// returning. Not part of the transport itself.
pub fn self_test() -> Result<Bytes> {
    let config = Config::builder()
        .bind_addr("127.0.0.1")
        .timeout(std::time::Duration::from_secs(5))
        .build();

    let server = Server::new(&config);
    server.start(echo_handler, 0, RunMode::Background)?;
    let port = server
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or_default();

    let mut connection = Connection::new(&config);
    connection.connect("127.0.0.1", port)?;
    connection.write(SELF_TEST_MESSAGE)?;
    let reply = connection.read()?;

    connection.disconnect();
    server.stop();

    Ok(reply)
}
