//! Packet verbs, as far as peer bookkeeping needs them.

use crate::error::PeerError;

/// Packet verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Verb {
    /// No operation
    Nop = 0x00,
    /// Handshake / liveness probe
    Hello = 0x01,
    /// Error response
    Error = 0x02,
    /// Positive response
    Ok = 0x03,
    /// Identity lookup
    Whois = 0x04,
    /// NAT traversal introduction
    Rendezvous = 0x05,
    /// Unicast network frame
    Frame = 0x06,
    /// Multicast membership assertion
    MulticastLike = 0x07,
    /// Multicast network frame
    MulticastFrame = 0x08,
}

impl Verb {
    /// Whether this verb carries a unicast data frame.
    #[must_use]
    pub const fn is_unicast_frame(self) -> bool {
        matches!(self, Self::Frame)
    }

    /// Whether this verb carries a multicast data frame.
    #[must_use]
    pub const fn is_multicast_frame(self) -> bool {
        matches!(self, Self::MulticastFrame)
    }
}

impl TryFrom<u8> for Verb {
    type Error = PeerError;

    fn try_from(value: u8) -> Result<Self, PeerError> {
        match value {
            0x00 => Ok(Self::Nop),
            0x01 => Ok(Self::Hello),
            0x02 => Ok(Self::Error),
            0x03 => Ok(Self::Ok),
            0x04 => Ok(Self::Whois),
            0x05 => Ok(Self::Rendezvous),
            0x06 => Ok(Self::Frame),
            0x07 => Ok(Self::MulticastLike),
            0x08 => Ok(Self::MulticastFrame),
            _ => Err(PeerError::UnknownVerb(value)),
        }
    }
}
