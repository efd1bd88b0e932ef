//! # Veil Crypto
//!
//! Identity primitives for the Veil overlay.
//!
//! This crate provides:
//! - X25519 identities with 40-bit overlay addresses
//! - Deterministic session key agreement (X25519 + BLAKE3 KDF)
//! - Zeroization of secret material
//!
//! Payload encryption lives above this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod hash;
pub mod identity;

pub use error::CryptoError;
pub use identity::{Address, Identity, SessionKey};

/// Length of the per-peer session key produced by agreement
pub const SESSION_KEY_LENGTH: usize = 32;

/// Overlay address size in bytes
pub const ADDRESS_LENGTH: usize = 5;
