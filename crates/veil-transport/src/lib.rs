//! # Veil Transport
//!
//! Network transport layer for the Veil overlay.
//!
//! This crate provides:
//! - Disguised message framing over byte streams ([`FramedStreamChannel`])
//! - Bounded send queue and receive accumulator
//! - The notification contract with an external readiness-driven I/O loop
//! - Dual-stack UDP sockets for peer paths, including low-TTL firewall
//!   openers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod multiplexer;
pub mod socket;
pub mod transport;
pub mod udp;

pub use channel::{ChannelStats, FramedStreamChannel};
pub use config::{DEFAULT_MAX_MESSAGE_LEN, StreamConfig};
pub use error::{ChannelError, TransportError, TransportResult, is_fatal_socket_error};
pub use multiplexer::{ChannelId, Multiplexer, PacketHandler};
pub use socket::StreamSocket;
pub use transport::PathTransport;
pub use udp::{DualStackUdp, UdpTransport};
