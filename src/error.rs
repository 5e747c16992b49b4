//! Error types for xmodem-fetch.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all transfer operations.
#[derive(Debug, Error)]
pub enum XmodemError {
    /// I/O error on the transport or the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection attempt did not complete within the wait bound.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The server never produced the affirmative greeting token.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A transport read exceeded the configured wait time mid-transfer.
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// Protocol violation that cannot be absorbed by the retry scheme.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using XmodemError.
pub type Result<T> = std::result::Result<T, XmodemError>;
