//! # quietwire
//!
//! A minimal message transport over TCP:
//! - `Connection` sends and receives discrete messages over a byte stream
//! - Message boundaries are reconstructed by quiescence detection
//!   (transmission pauses), not by length prefixes or delimiters
//! - `Server` accepts connections and dispatches each one serially to a
//!   caller-supplied handler
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Server                                │
//! │        (accept loop: inline or background thread)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one Connection per accepted peer
//!                       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              handler(peer_addr, Connection)                  │
//! │          (runs to completion before next accept)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!            ┌─────────────────────┐
//!            │     Connection      │
//!            │  read / write over  │
//!            │    one TcpStream    │
//!            └─────────────────────┘
//! ```
//!
//! ## Message boundaries are a heuristic
//!
//! `Connection::read` treats a short pause on the wire as "message
//! complete". That makes quietwire a fit for simple request/response
//! protocols where each side sends one message, pauses, and waits for a
//! reply. It is explicitly the wrong tool for pipelined or persistently
//! streaming protocols: a sender that pauses mid-message gets split, and
//! back-to-back messages with no pause get merged.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod connection;
pub mod server;
pub mod selftest;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WireError};
pub use config::Config;
pub use connection::{Connection, ConnectionState};
pub use server::{RunMode, Server, ServerState};
pub use selftest::{echo_handler, self_test, SELF_TEST_MESSAGE};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of quietwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
