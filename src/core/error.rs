//! Error types shared across the router.
//!
//! Every failure is handled where it occurs: a [`DecodeError`] drops one
//! message, a [`KernelError`] is logged, a [`SourceError`] leaves the router
//! with no local prefixes. Only [`RouterError`] reaches the process entry point.

use thiserror::Error;

/// Malformed or undecodable input (a protocol error).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of data.
    #[error("unexpected end of data")]
    UnexpectedEof,

    /// Bytes left over after a complete message.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// Unsupported protocol version.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Unknown frame or message type.
    #[error("unknown message type: 0x{0:02x}")]
    UnknownType(u8),

    /// String field is not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Prefix text could not be parsed.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// Prefix length outside 0..=32.
    #[error("invalid prefix length: {0}")]
    InvalidPrefixLength(u8),

    /// Identifier is empty or reserved.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Identifier does not fit the wire length prefix.
    #[error("identifier too long: {0} bytes")]
    IdentifierTooLong(usize),
}

/// Failure to encode an outgoing message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Encoded message would exceed the size limit.
    #[error("message too large: {size} bytes, limit {limit}")]
    TooLarge {
        /// Encoded size.
        size: usize,
        /// Allowed size.
        limit: usize,
    },

    /// More routes than the count field can carry.
    #[error("too many routes: {0}")]
    TooManyRoutes(usize),
}

/// Forwarding-table mutation failed. Never rolls back the routing table.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The helper command could not be started.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Command line that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The helper command exited unsuccessfully.
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// Command line that was attempted.
        command: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Local-route enumeration failed at startup.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The helper command could not be run.
    #[error("failed to read host routes: {0}")]
    Io(#[from] std::io::Error),

    /// The helper command exited unsuccessfully.
    #[error("host route listing failed: {0}")]
    CommandFailed(String),
}

/// Top-level router errors (startup and configuration only).
#[derive(Debug, Error)]
pub enum RouterError {
    /// Configuration rejected by validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A listener could not be bound.
    #[error("bind {what} on {addr} failed: {source}")]
    Bind {
        /// Which listener.
        what: &'static str,
        /// Requested address.
        addr: std::net::SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A router task stopped.
    #[error("{0} task exited")]
    TaskExited(String),
}
