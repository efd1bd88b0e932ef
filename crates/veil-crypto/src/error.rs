//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Local identity carries no secret key, so it cannot agree
    #[error("identity has no secret key")]
    MissingSecret,

    /// Remote public key produced a low-order (all-zero) shared secret
    #[error("key agreement produced a low-order shared secret")]
    LowOrderPoint,

    /// Hex-encoded key could not be decoded
    #[error("invalid key encoding")]
    InvalidEncoding,
}
