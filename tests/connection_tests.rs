//! Tests for Connection
//!
//! These tests verify:
//! - Round-trip message fidelity through quiescence reconstruction
//! - Timeout vs peer-closed vs misuse error reporting
//! - Lifecycle transitions and disconnect idempotence

use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use quietwire::{Config, Connection, ConnectionState, WireError};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .timeout(Duration::from_secs(2))
        .quiet_window(Duration::from_millis(100))
        .build()
}

/// A connected client/server Connection pair over loopback.
fn pair(config: &Config) -> (Connection, Connection) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut client = Connection::new(config);
    client.connect("127.0.0.1", port).unwrap();

    let (stream, _) = listener.accept().unwrap();
    let server = Connection::from_stream(stream, config).unwrap();

    (client, server)
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_write_then_read_round_trip() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    client.write(b"hello over the wire").unwrap();
    let message = server.read().unwrap();

    assert_eq!(&message[..], b"hello over the wire");
}

#[test]
fn test_write_accepts_text() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    client.write("plain text payload").unwrap();
    let message = server.read().unwrap();

    assert_eq!(&message[..], b"plain text payload");
}

#[test]
fn test_large_payload_round_trip() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    // Big enough to be delivered in several chunks.
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();

    let sent = payload.clone();
    let writer = thread::spawn(move || {
        client.write(&sent).unwrap();
        client
    });

    let message = server.read().unwrap();
    writer.join().unwrap();

    assert_eq!(message.len(), payload.len());
    assert_eq!(&message[..], &payload[..]);
}

#[test]
fn test_bursts_within_quiet_window_form_one_message() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    let writer = thread::spawn(move || {
        client.write(b"first burst ").unwrap();
        thread::sleep(Duration::from_millis(30));
        client.write(b"second burst").unwrap();
        client
    });

    let message = server.read().unwrap();
    writer.join().unwrap();

    assert_eq!(&message[..], b"first burst second burst");
}

#[test]
fn test_pause_longer_than_quiet_window_splits_messages() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    let writer = thread::spawn(move || {
        client.write(b"message one").unwrap();
        thread::sleep(Duration::from_millis(400));
        client.write(b"message two").unwrap();
        client
    });

    let first = server.read().unwrap();
    let second = server.read().unwrap();
    writer.join().unwrap();

    assert_eq!(&first[..], b"message one");
    assert_eq!(&second[..], b"message two");
}

#[test]
fn test_orderly_close_after_payload_completes_message() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    client.write(b"parting words").unwrap();
    client.disconnect();

    let message = server.read().unwrap();
    assert_eq!(&message[..], b"parting words");
}

// =============================================================================
// Failure Reporting Tests
// =============================================================================

#[test]
fn test_read_times_out_with_no_peer_activity() {
    let config = test_config();
    let (_client, mut server) = pair(&config);

    let started = Instant::now();
    let err = server
        .read_with_timeout(Duration::from_millis(300))
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, WireError::Timeout));
    // The override, not the 2s configured timeout, bounded the wait.
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[test]
fn test_read_reports_peer_closed_before_any_bytes() {
    let config = test_config();
    let (mut client, mut server) = pair(&config);

    client.disconnect();

    let err = server.read().unwrap_err();
    assert!(matches!(err, WireError::PeerClosed));
}

#[test]
fn test_dropped_peer_is_reported_as_closed() {
    let config = test_config();
    let (client, mut server) = pair(&config);

    // Drop-triggered teardown must behave like an explicit disconnect.
    drop(client);

    let err = server.read().unwrap_err();
    assert!(matches!(err, WireError::PeerClosed));
}

#[test]
fn test_connect_to_refused_port_fails() {
    let config = test_config();

    // Bind and immediately release a port so nothing is listening on it.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut connection = Connection::new(&config);
    let err = connection.connect("127.0.0.1", port).unwrap_err();

    assert!(matches!(err, WireError::Io(_)));
    assert_eq!(connection.state(), ConnectionState::Unconnected);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_disconnect_is_idempotent() {
    let config = test_config();
    let (mut client, _server) = pair(&config);

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Closed);

    // Second call is a no-op, not an error.
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn test_read_write_require_connected_state() {
    let config = test_config();
    let mut connection = Connection::new(&config);

    assert!(matches!(
        connection.read().unwrap_err(),
        WireError::NotConnected
    ));
    assert!(matches!(
        connection.write(b"nope").unwrap_err(),
        WireError::NotConnected
    ));
}

#[test]
fn test_connect_on_connected_connection_fails() {
    let config = test_config();
    let (mut client, _server) = pair(&config);

    let err = client.connect("127.0.0.1", 1).unwrap_err();
    assert!(matches!(err, WireError::AlreadyConnected));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[test]
fn test_closed_connection_cannot_reconnect() {
    let config = test_config();
    let (mut client, _server) = pair(&config);

    client.disconnect();

    let err = client.connect("127.0.0.1", 1).unwrap_err();
    assert!(matches!(err, WireError::Closed));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn test_peer_addr_tracks_state() {
    let config = test_config();
    let (mut client, _server) = pair(&config);

    assert!(client.peer_addr().is_some());
    client.disconnect();
    assert!(client.peer_addr().is_none());

    let unconnected = Connection::new(&config);
    assert!(unconnected.peer_addr().is_none());
}
