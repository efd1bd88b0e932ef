//! Error types for the Veil transport layer.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use veil_obfuscation::RecordError;

/// Errors raised by a [`FramedStreamChannel`](crate::channel::FramedStreamChannel).
///
/// `MessageTooLarge` and `SendQueueFull` reject a single send and leave the
/// channel usable. Every other variant is fatal: the multiplexer must close
/// the channel and drop it from its table.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Outgoing message exceeds the configured maximum
    #[error("message of {len} bytes exceeds maximum of {max}")]
    MessageTooLarge {
        /// Message length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Enqueuing the message would grow the send queue past its cap
    #[error("send queue full: {queued} bytes queued, frame needs {frame}, cap {cap}")]
    SendQueueFull {
        /// Bytes already queued
        queued: usize,
        /// Size of the rejected frame
        frame: usize,
        /// Hard cap on queued bytes
        cap: usize,
    },

    /// Peer closed the stream
    #[error("stream closed")]
    Closed,

    /// Input accumulator would exceed its fixed capacity
    #[error("input overrun: accumulator capacity {capacity} exceeded")]
    InputOverrun {
        /// Accumulator capacity
        capacity: usize,
    },

    /// Stream does not carry disguise records
    #[error("unsupported framing: {0}")]
    UnsupportedFraming(#[source] RecordError),

    /// Unrecoverable socket error
    #[error("socket error: {0}")]
    Socket(#[source] io::Error),
}

impl ChannelError {
    /// Whether the channel must be torn down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MessageTooLarge { .. } | Self::SendQueueFull { .. }
        )
    }
}

/// Transport setup and configuration errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error from the underlying socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No socket bound for the destination's address family
    #[error("No socket for address family of {0}")]
    NoSocketForFamily(SocketAddr),
}

/// Result type for transport setup
pub type TransportResult<T> = Result<T, TransportError>;

/// Whether a socket write error means the stream is unusable.
///
/// Bad descriptor, invalid argument, not-a-socket, connection reset, broken
/// pipe and network down are fatal. Anything else (would-block, interrupted,
/// buffer exhaustion) is retried on the next write notification.
#[must_use]
pub fn is_fatal_socket_error(err: &io::Error) -> bool {
    if let Some(code) = err.raw_os_error() {
        return matches!(
            code,
            libc::EBADF
                | libc::EINVAL
                | libc::ENOTSOCK
                | libc::ECONNRESET
                | libc::EPIPE
                | libc::ENETDOWN
        );
    }
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}
