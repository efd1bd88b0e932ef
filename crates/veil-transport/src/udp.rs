//! UDP datagram transport for peer paths.
//!
//! [`UdpTransport`] wraps one non-blocking UDP socket. [`DualStackUdp`]
//! pairs an IPv4 and an IPv6 socket and implements [`PathTransport`] by
//! routing on the destination's address family.

use crate::error::{TransportError, TransportResult};
use crate::transport::PathTransport;
use rand::Rng;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Size of the random firewall-opener probe
pub const FIREWALL_OPENER_PROBE_LEN: usize = 4;

/// Receive buffer size (jumbo datagrams)
const RECV_BUFFER_LEN: usize = 65536;

/// Socket buffer size requested from the kernel
const SOCKET_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// A single non-blocking UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
    recv_buf: Vec<u8>,
    /// Held for every send and TTL change so a lowered hop limit never
    /// leaks into another sender's datagram
    send_lock: Mutex<()>,
}

impl UdpTransport {
    /// Bind a socket to `addr`. Use port 0 for automatic port selection.
    ///
    /// IPv6 sockets are bound v6-only so a dual-stack pair can share a port.
    ///
    /// # Errors
    ///
    /// Any socket creation, option or bind error.
    pub fn bind<A: Into<SocketAddr>>(addr: A) -> io::Result<Self> {
        let addr = addr.into();

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        if addr.is_ipv6() {
            socket2.set_only_v6(true)?;
        }
        socket2.set_nonblocking(true)?;

        // Kernels may clamp these; not fatal
        if let Err(e) = socket2.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
            debug!(error = %e, "could not raise UDP receive buffer");
        }
        if let Err(e) = socket2.set_send_buffer_size(SOCKET_BUFFER_SIZE) {
            debug!(error = %e, "could not raise UDP send buffer");
        }

        socket2.bind(&addr.into())?;

        Ok(Self {
            socket: socket2.into(),
            recv_buf: vec![0u8; RECV_BUFFER_LEN],
            send_lock: Mutex::new(()),
        })
    }

    fn lock_sends(&self) -> MutexGuard<'_, ()> {
        self.send_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive one datagram into the internal buffer.
    ///
    /// Returns the size and sender; the bytes are in
    /// [`recv_buffer`](Self::recv_buffer). Returns `WouldBlock` when idle.
    ///
    /// # Errors
    ///
    /// Any socket error.
    pub fn recv_from(&mut self) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(&mut self.recv_buf)
    }

    /// Buffer filled by [`recv_from`](Self::recv_from).
    #[must_use]
    pub fn recv_buffer(&self) -> &[u8] {
        &self.recv_buf
    }

    /// Send one datagram.
    ///
    /// # Errors
    ///
    /// Any socket error, including `WouldBlock` when the send buffer is full.
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let _sending = self.lock_sends();
        self.socket.send_to(buf, addr)
    }

    /// Send one datagram with a temporary TTL (IPv4) or unicast hop limit
    /// (IPv6), restoring the previous value afterwards.
    ///
    /// Other sends on this socket wait until the value is restored.
    ///
    /// # Errors
    ///
    /// Any error reading or setting the option, or from the send itself.
    pub fn send_with_hop_limit(&self, buf: &[u8], addr: SocketAddr, hops: u32) -> io::Result<usize> {
        let _sending = self.lock_sends();
        if addr.is_ipv4() {
            let previous = self.socket.ttl()?;
            self.socket.set_ttl(hops)?;
            let sent = self.socket.send_to(buf, addr);
            self.socket.set_ttl(previous)?;
            sent
        } else {
            let sock = SockRef::from(&self.socket);
            let previous = sock.unicast_hops_v6()?;
            sock.set_unicast_hops_v6(hops)?;
            let sent = self.socket.send_to(buf, addr);
            sock.set_unicast_hops_v6(previous)?;
            sent
        }
    }

    /// Local address this socket is bound to.
    ///
    /// # Errors
    ///
    /// Any socket error.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Set the default TTL for outgoing IPv4 packets.
    ///
    /// # Errors
    ///
    /// Any socket error.
    pub fn set_ttl(&self, ttl: u32) -> io::Result<()> {
        let _sending = self.lock_sends();
        self.socket.set_ttl(ttl)
    }
}

/// IPv4 and IPv6 sockets used as a [`PathTransport`].
#[derive(Default)]
pub struct DualStackUdp {
    v4: Option<UdpTransport>,
    v6: Option<UdpTransport>,
}

impl DualStackUdp {
    /// Pair existing sockets. Either family may be absent.
    #[must_use]
    pub fn new(v4: Option<UdpTransport>, v6: Option<UdpTransport>) -> Self {
        Self { v4, v6 }
    }

    /// Bind one socket per address given.
    ///
    /// # Errors
    ///
    /// Any bind error, or `TransportError::InvalidConfig` if `v4` is not an
    /// IPv4 address or `v6` not an IPv6 address.
    pub fn bind(v4: Option<SocketAddr>, v6: Option<SocketAddr>) -> TransportResult<Self> {
        if v4.is_some_and(|a| !a.is_ipv4()) || v6.is_some_and(|a| !a.is_ipv6()) {
            return Err(TransportError::InvalidConfig(
                "dual-stack bind addresses must match their families".to_string(),
            ));
        }
        Ok(Self {
            v4: v4.map(UdpTransport::bind).transpose()?,
            v6: v6.map(UdpTransport::bind).transpose()?,
        })
    }

    /// Socket for `to`'s address family.
    ///
    /// # Errors
    ///
    /// `TransportError::NoSocketForFamily` if that family is not bound.
    pub fn socket_for(&self, to: SocketAddr) -> TransportResult<&UdpTransport> {
        let socket = if to.is_ipv4() { &self.v4 } else { &self.v6 };
        socket.as_ref().ok_or(TransportError::NoSocketForFamily(to))
    }

    /// IPv4 socket, if bound.
    #[must_use]
    pub fn v4(&self) -> Option<&UdpTransport> {
        self.v4.as_ref()
    }

    /// IPv6 socket, if bound.
    #[must_use]
    pub fn v6(&self) -> Option<&UdpTransport> {
        self.v6.as_ref()
    }
}

impl PathTransport for DualStackUdp {
    fn send(&self, to: SocketAddr, fixed_format: bool, data: &[u8]) -> bool {
        if fixed_format {
            debug!(%to, "stream encapsulation not available on datagram transport");
            return false;
        }
        let socket = match self.socket_for(to) {
            Ok(socket) => socket,
            Err(e) => {
                debug!(error = %e, "no socket for path");
                return false;
            }
        };
        match socket.send_to(data, to) {
            Ok(n) if n == data.len() => true,
            Ok(n) => {
                debug!(%to, sent = n, len = data.len(), "short datagram send");
                false
            }
            Err(e) => {
                debug!(%to, error = %e, "datagram send failed");
                false
            }
        }
    }

    fn send_firewall_opener(&self, to: SocketAddr, hops: u32) -> bool {
        let Ok(socket) = self.socket_for(to) else {
            return false;
        };
        let mut probe = [0u8; FIREWALL_OPENER_PROBE_LEN];
        rand::thread_rng().fill(&mut probe[..]);
        match socket.send_with_hop_limit(&probe, to, hops) {
            Ok(_) => {
                trace!(%to, hops, "firewall opener sent");
                true
            }
            Err(e) => {
                debug!(%to, error = %e, "firewall opener failed");
                false
            }
        }
    }
}
