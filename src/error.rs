//! Error types for quietwire
//!
//! Provides a unified error type for all operations. A failed read
//! distinguishes inactivity (`Timeout`) from transport failure
//! (`Io`/`PeerClosed`) so callers can branch without inspecting the
//! underlying I/O error.

use thiserror::Error;

/// Result type alias using WireError
pub type Result<T> = std::result::Result<T, WireError>;

/// Unified error type for quietwire operations
#[derive(Debug, Error)]
pub enum WireError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No activity within the effective timeout. Only produced by read;
    /// a connect that times out surfaces as `Io`.
    #[error("no data received within the timeout window")]
    Timeout,

    /// The peer performed an orderly close before sending any payload.
    #[error("connection closed by peer")]
    PeerClosed,

    // -------------------------------------------------------------------------
    // Lifecycle Misuse (local faults, never retried)
    // -------------------------------------------------------------------------
    #[error("connection is not established")]
    NotConnected,

    #[error("connection is already established")]
    AlreadyConnected,

    /// The connection was closed earlier; a closed connection cannot be
    /// reconnected.
    #[error("connection has been closed")]
    Closed,

    #[error("server is already listening")]
    AlreadyListening,

    // -------------------------------------------------------------------------
    // Resolution Errors
    // -------------------------------------------------------------------------
    #[error("address resolved to no usable endpoints: {0}")]
    Resolve(String),
}

impl WireError {
    /// True for the inactivity case, as opposed to transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WireError::Timeout)
    }
}
