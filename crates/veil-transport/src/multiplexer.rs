//! Contract between stream channels and the readiness-driven I/O loop.
//!
//! The loop itself lives outside this crate. It owns the connection table,
//! polls sockets, and calls [`FramedStreamChannel::notify_available_for_read`]
//! and [`FramedStreamChannel::notify_available_for_write`] strictly serially
//! per channel. Any `Err` from those hooks means: close the channel and drop
//! it from the table.
//!
//! [`FramedStreamChannel::notify_available_for_read`]: crate::channel::FramedStreamChannel::notify_available_for_read
//! [`FramedStreamChannel::notify_available_for_write`]: crate::channel::FramedStreamChannel::notify_available_for_write

use crate::channel::FramedStreamChannel;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Token identifying a channel within the multiplexer's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registration handle into the I/O loop.
///
/// Called from arbitrary threads (any sender may trigger
/// `start_notify_write`), so implementations must be thread-safe.
pub trait Multiplexer: Send + Sync {
    /// Begin delivering write-ready notifications for `id`.
    fn start_notify_write(&self, id: ChannelId);

    /// Stop delivering write-ready notifications for `id`.
    fn stop_notify_write(&self, id: ChannelId);

    /// Interrupt a blocked poll so new registrations take effect.
    fn wake(&self);
}

/// Receiver of decoded messages.
pub trait PacketHandler {
    /// Handle one decoded payload that arrived on `channel` from `from`.
    ///
    /// Runs on the multiplexer thread while the channel's input state is
    /// held. It may send on any channel but must not re-enter the read hook.
    fn handle_received_packet(
        &self,
        channel: &Arc<FramedStreamChannel>,
        from: SocketAddr,
        payload: &[u8],
    );
}
