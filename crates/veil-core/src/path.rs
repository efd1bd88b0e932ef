//! Direct network paths to a peer.
//!
//! A peer has at most one IPv4 and one IPv6 path. Timestamps are
//! milliseconds on the caller's clock, with 0 meaning "never".

use crate::config::PATH_ACTIVITY_TIMEOUT_MS;
use std::net::SocketAddr;

/// Address family of a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl AddressFamily {
    /// Family of a socket address.
    #[must_use]
    pub const fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => Self::V4,
            SocketAddr::V6(_) => Self::V6,
        }
    }
}

/// State of one direct path
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathState {
    /// Remote endpoint, if known
    pub address: Option<SocketAddr>,
    /// Pinned by configuration; inbound packets do not move it
    pub fixed: bool,
    /// Last successful send
    pub last_send: u64,
    /// Last direct receive
    pub last_receive: u64,
    /// Last firewall opener sent
    pub last_firewall_opener: u64,
}

impl PathState {
    /// Whether the path has an address and heard from the peer within the
    /// default activity window.
    #[must_use]
    pub fn is_active(&self, now: u64) -> bool {
        self.is_active_within(now, PATH_ACTIVITY_TIMEOUT_MS)
    }

    /// As [`is_active`](Self::is_active) with an explicit window.
    #[must_use]
    pub fn is_active_within(&self, now: u64, timeout_ms: u64) -> bool {
        self.address.is_some() && now.saturating_sub(self.last_receive) <= timeout_ms
    }

    /// Record a direct receive from `from`.
    ///
    /// Returns the previous address when the path roamed.
    pub fn learn(&mut self, from: SocketAddr, now: u64) -> Option<SocketAddr> {
        self.last_receive = now;
        if self.fixed || self.address == Some(from) {
            return None;
        }
        self.address.replace(from)
    }
}
