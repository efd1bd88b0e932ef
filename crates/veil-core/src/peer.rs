//! Per-peer session state and path selection.
//!
//! A [`PeerSession`] is shared between the packet dispatcher, which calls
//! [`PeerSession::on_receive`], and any number of sender threads. All mutable
//! state sits behind one lock. Collaborators ([`PathTransport`] and
//! [`PeerNotifier`]) are always called with that lock released, so they may
//! call back into the session.

use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::path::{AddressFamily, PathState};
use crate::verb::Verb;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};
use veil_crypto::{Address, Identity, SessionKey};
use veil_transport::PathTransport;

/// Node-level services a session needs but does not own.
pub trait PeerNotifier: Send + Sync {
    /// Send a HELLO to `peer` at `to`. Returns true if it was handed to the
    /// network.
    fn send_hello(&self, peer: &Arc<PeerSession>, to: SocketAddr) -> bool;

    /// Push this node's multicast group memberships to `peer`.
    fn announce_multicast_groups(&self, peer: &Arc<PeerSession>);
}

/// Header fields of a decoded inbound packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InboundPacket {
    /// Source endpoint
    pub remote: SocketAddr,
    /// Relay hop count; 0 means it came straight from the peer
    pub hops: u8,
    /// Packet ID
    pub packet_id: u64,
    /// Verb
    pub verb: Verb,
    /// Packet this one answers, for OK / ERROR
    pub in_re_packet_id: u64,
    /// Verb of the packet this one answers
    pub in_re_verb: Option<Verb>,
}

impl InboundPacket {
    /// A direct (zero-hop) packet with no reply context.
    #[must_use]
    pub const fn direct(remote: SocketAddr, packet_id: u64, verb: Verb) -> Self {
        Self {
            remote,
            hops: 0,
            packet_id,
            verb,
            in_re_packet_id: 0,
            in_re_verb: None,
        }
    }

    /// Same packet with a different hop count.
    #[must_use]
    pub const fn with_hops(mut self, hops: u8) -> Self {
        self.hops = hops;
        self
    }
}

/// Software version the remote reported
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemoteVersion {
    /// Major
    pub major: u8,
    /// Minor
    pub minor: u8,
    /// Revision
    pub revision: u16,
}

impl fmt::Display for RemoteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Copy of a session's mutable state, taken under its lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerSnapshot {
    /// IPv4 path
    pub v4: PathState,
    /// IPv6 path
    pub v6: PathState,
    /// Last time the node used this peer for anything
    pub last_used: u64,
    /// Last unicast FRAME received
    pub last_unicast_frame: u64,
    /// Last MULTICAST_FRAME received
    pub last_multicast_frame: u64,
    /// Last multicast group announcement to this peer
    pub last_announced_to: u64,
    /// Last ping, as recorded by the caller
    pub last_pinged: u64,
    /// Remote software version (all zero if unknown)
    pub remote_version: RemoteVersion,
    /// Round-trip latency in milliseconds (0 if unknown)
    pub latency: u32,
}

impl PeerSnapshot {
    fn path(&self, family: AddressFamily) -> &PathState {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }

    fn path_mut(&mut self, family: AddressFamily) -> &mut PathState {
        match family {
            AddressFamily::V4 => &mut self.v4,
            AddressFamily::V6 => &mut self.v6,
        }
    }
}

/// A remote peer, its session key and its direct paths.
pub struct PeerSession {
    identity: Identity,
    key: SessionKey,
    config: PeerConfig,
    state: Mutex<PeerSnapshot>,
}

impl PeerSession {
    /// Create a session with default timing.
    ///
    /// # Errors
    ///
    /// `PeerError::KeyAgreementFailed` if `local` has no secret key or the
    /// agreement with `remote` is rejected.
    pub fn new(local: &Identity, remote: &Identity) -> Result<Self> {
        Self::with_config(local, remote, PeerConfig::default())
    }

    /// Create a session with explicit timing.
    ///
    /// # Errors
    ///
    /// `PeerError::InvalidConfig` if `config` does not validate, otherwise as
    /// [`new`](Self::new).
    pub fn with_config(local: &Identity, remote: &Identity, config: PeerConfig) -> Result<Self> {
        config.validate()?;
        let key = local
            .agree(remote)
            .map_err(PeerError::KeyAgreementFailed)?;

        debug!(peer = %remote.address(), "peer session created");

        Ok(Self {
            identity: remote.to_public(),
            key,
            config,
            state: Mutex::new(PeerSnapshot::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PeerSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process the header of an inbound packet from this peer.
    ///
    /// Direct packets refresh (and, unless pinned, roam) the path of the
    /// source family and may trigger a multicast announcement.
    pub fn on_receive(self: &Arc<Self>, notifier: &dyn PeerNotifier, packet: &InboundPacket, now: u64) {
        let announce = {
            let mut state = self.lock();
            let mut announce = false;

            if packet.hops == 0 {
                let family = AddressFamily::of(&packet.remote);
                if let Some(previous) = state.path_mut(family).learn(packet.remote, now) {
                    debug!(
                        peer = %self.address(),
                        %previous,
                        current = %packet.remote,
                        "path roamed"
                    );
                }

                if now.saturating_sub(state.last_announced_to)
                    >= self.config.announce_interval_ms()
                {
                    state.last_announced_to = now;
                    announce = true;
                }
            }

            if packet.verb.is_unicast_frame() {
                state.last_unicast_frame = now;
            } else if packet.verb.is_multicast_frame() {
                state.last_multicast_frame = now;
            }

            announce
        };

        trace!(
            peer = %self.address(),
            from = %packet.remote,
            hops = packet.hops,
            packet_id = packet.packet_id,
            verb = ?packet.verb,
            in_re_packet_id = packet.in_re_packet_id,
            in_re_verb = ?packet.in_re_verb,
            "received"
        );

        if announce {
            debug!(peer = %self.address(), "announcing multicast groups");
            notifier.announce_multicast_groups(self);
        }
    }

    /// Send `data` over the best direct path.
    ///
    /// IPv6 goes first when it is active, or when it is the only known path
    /// even if stale. IPv4 is the fallback. Returns the address used.
    ///
    /// # Errors
    ///
    /// - `PeerError::NoUsablePath` if no path has an address
    /// - `PeerError::SendRejected` if the transport refused every attempt
    pub fn send(&self, transport: &dyn PathTransport, data: &[u8], now: u64) -> Result<SocketAddr> {
        let (v4, v6, prefer_v6) = {
            let state = self.lock();
            let prefer_v6 = state
                .v6
                .is_active_within(now, self.config.path_activity_timeout_ms)
                || (state.v4.address.is_none() && state.v6.address.is_some());
            (state.v4.address, state.v6.address, prefer_v6)
        };

        let mut rejected = None;

        if prefer_v6 {
            if let Some(addr) = v6 {
                if transport.send(addr, false, data) {
                    self.lock().v6.last_send = now;
                    return Ok(addr);
                }
                rejected = Some(addr);
            }
        }

        if let Some(addr) = v4 {
            if transport.send(addr, false, data) {
                self.lock().v4.last_send = now;
                return Ok(addr);
            }
            rejected = Some(addr);
        }

        match rejected {
            Some(addr) => {
                debug!(peer = %self.address(), %addr, len = data.len(), "send rejected");
                Err(PeerError::SendRejected(addr))
            }
            None => Err(PeerError::NoUsablePath),
        }
    }

    /// Send a HELLO on every known path, IPv4 first.
    ///
    /// Returns true if at least one was sent.
    pub fn send_ping(self: &Arc<Self>, notifier: &dyn PeerNotifier, now: u64) -> bool {
        let mut sent = false;
        for (family, addr) in self.known_paths() {
            trace!(peer = %self.address(), %addr, "PING");
            if notifier.send_hello(self, addr) {
                self.lock().path_mut(family).last_send = now;
                sent = true;
            }
        }
        sent
    }

    /// Send a low-TTL firewall opener on every known path, IPv4 first.
    ///
    /// Returns true if at least one was sent.
    pub fn send_firewall_opener(&self, transport: &dyn PathTransport, now: u64) -> bool {
        let hops = self.config.firewall_opener_hops;
        let mut sent = false;
        for (family, addr) in self.known_paths() {
            trace!(peer = %self.address(), %addr, hops, "firewall opener");
            if transport.send_firewall_opener(addr, hops) {
                self.lock().path_mut(family).last_firewall_opener = now;
                sent = true;
            }
        }
        sent
    }

    fn known_paths(&self) -> impl Iterator<Item = (AddressFamily, SocketAddr)> {
        let state = self.lock();
        let paths = [
            (AddressFamily::V4, state.v4.address),
            (AddressFamily::V6, state.v6.address),
        ];
        drop(state);
        paths
            .into_iter()
            .filter_map(|(family, addr)| addr.map(|addr| (family, addr)))
    }

    /// Set the path address for `addr`'s family, optionally pinning it.
    pub fn set_path_address(&self, addr: SocketAddr, fixed: bool) {
        let mut state = self.lock();
        let path = state.path_mut(AddressFamily::of(&addr));
        path.address = Some(addr);
        path.fixed = fixed;
    }

    /// Unpin one family's path, or both with `None`.
    pub fn clear_fixed_flag(&self, family: Option<AddressFamily>) {
        let mut state = self.lock();
        match family {
            Some(family) => state.path_mut(family).fixed = false,
            None => {
                state.v4.fixed = false;
                state.v6.fixed = false;
            }
        }
    }

    /// Whether either path is active.
    #[must_use]
    pub fn has_active_direct_path(&self, now: u64) -> bool {
        let timeout = self.config.path_activity_timeout_ms;
        let state = self.lock();
        state.v4.is_active_within(now, timeout) || state.v6.is_active_within(now, timeout)
    }

    /// Most recent direct receive on any path.
    #[must_use]
    pub fn last_direct_receive(&self) -> u64 {
        let state = self.lock();
        state.v4.last_receive.max(state.v6.last_receive)
    }

    /// Most recent direct send on any path.
    #[must_use]
    pub fn last_direct_send(&self) -> u64 {
        let state = self.lock();
        state.v4.last_send.max(state.v6.last_send)
    }

    /// Path state for one family.
    #[must_use]
    pub fn path(&self, family: AddressFamily) -> PathState {
        *self.lock().path(family)
    }

    /// Copy of all mutable state.
    #[must_use]
    pub fn snapshot(&self) -> PeerSnapshot {
        *self.lock()
    }

    /// Record the version the remote reported.
    pub fn set_remote_version(&self, major: u8, minor: u8, revision: u16) {
        self.lock().remote_version = RemoteVersion {
            major,
            minor,
            revision,
        };
    }

    /// Record a measured round-trip latency.
    pub fn set_latency(&self, latency_ms: u32) {
        self.lock().latency = latency_ms;
    }

    /// Mark the peer as used at `now`.
    pub fn set_last_used(&self, now: u64) {
        self.lock().last_used = now;
    }

    /// Record that the caller pinged the peer at `now`.
    pub fn set_last_pinged(&self, now: u64) {
        self.lock().last_pinged = now;
    }

    /// Remote identity (public only).
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Remote overlay address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.identity.address()
    }

    /// Agreed session key.
    #[must_use]
    pub const fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Timing configuration.
    #[must_use]
    pub const fn config(&self) -> &PeerConfig {
        &self.config
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("address", &self.address())
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}
