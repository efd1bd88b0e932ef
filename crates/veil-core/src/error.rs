//! Error types for peer sessions.

use std::net::SocketAddr;
use thiserror::Error;

/// Peer session errors
#[derive(Debug, Error)]
pub enum PeerError {
    /// Session key agreement with the remote identity failed
    #[error("key agreement failed: {0}")]
    KeyAgreementFailed(#[source] veil_crypto::CryptoError),

    /// Neither path has a known address
    #[error("no usable path")]
    NoUsablePath,

    /// The transport refused the send on every candidate path
    #[error("send rejected by transport (last tried {0})")]
    SendRejected(SocketAddr),

    /// Verb byte not recognised
    #[error("unknown verb: 0x{0:02x}")]
    UnknownVerb(u8),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for peer operations
pub type Result<T> = std::result::Result<T, PeerError>;
