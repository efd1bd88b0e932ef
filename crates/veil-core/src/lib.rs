//! # Veil Core
//!
//! Peer connectivity for the Veil overlay.
//!
//! This crate provides:
//! - Dual-stack direct path tracking with roaming and pinned addresses
//! - Path selection for outbound packets (IPv6 preferred when live)
//! - Keepalive pings and low-TTL firewall openers
//! - Rate-limited multicast group announcements
//!
//! The core keeps no timers. Callers pass a monotonic millisecond `now` into
//! every operation and drive periodic work themselves.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod path;
pub mod peer;
pub mod verb;

pub use config::PeerConfig;
pub use error::{PeerError, Result};
pub use path::{AddressFamily, PathState};
pub use peer::{InboundPacket, PeerNotifier, PeerSession, PeerSnapshot, RemoteVersion};
pub use verb::Verb;
