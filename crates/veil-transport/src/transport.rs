//! Datagram path transport abstraction.
//!
//! Peer sessions send over whichever family-specific path they select; the
//! socket machinery behind that is hidden behind [`PathTransport`].

use std::net::SocketAddr;

/// Sends raw packets toward one path of a peer.
///
/// Both methods report plain success or failure. A failed send is dropped;
/// retry policy belongs to the caller.
pub trait PathTransport: Send + Sync {
    /// Send `data` to `to`.
    ///
    /// `fixed_format` requests the disguised stream encapsulation instead of
    /// plain datagrams. Path sends from peer sessions always pass `false`.
    fn send(&self, to: SocketAddr, fixed_format: bool, data: &[u8]) -> bool;

    /// Send a short probe with its TTL / hop limit lowered to `hops`.
    ///
    /// Used to open or refresh NAT bindings; the probe is not expected to
    /// reach the peer.
    fn send_firewall_opener(&self, to: SocketAddr, hops: u32) -> bool;
}
