//! Transport layer error types.

use std::io;

use thiserror::Error;

use crate::core::{DecodeError, EncodeError};

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A frame body could not be decoded.
    #[error("malformed message: {0}")]
    Decode(#[from] DecodeError),

    /// Frame length header is zero or over the limit, or an outgoing
    /// message does not fit.
    #[error("frame error: {0}")]
    Frame(#[from] EncodeError),

    /// Peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Handshake did not complete in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// A well-formed message arrived where another kind was expected.
    #[error("unexpected {0} message")]
    UnexpectedMessage(&'static str),

    /// The peer announced our own identifier.
    #[error("peer announced our own router id")]
    SelfConnection,
}

impl TransportError {
    /// Check if this error ends the session.
    ///
    /// Non-fatal errors drop one message; the stream stays in sync because
    /// the whole frame was consumed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_)
                | TransportError::Frame(_)
                | TransportError::ConnectionClosed
                | TransportError::HandshakeTimeout
                | TransportError::SelfConnection
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
