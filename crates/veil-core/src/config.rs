//! Peer session timing configuration.
//!
//! All durations are milliseconds on the caller's monotonic clock.

use crate::error::{PeerError, Result};
use serde::{Deserialize, Serialize};

/// Interval at which callers are expected to ping direct paths
pub const PING_INTERVAL_MS: u64 = 120_000;

/// A path that has received nothing for this long is inactive
pub const PATH_ACTIVITY_TIMEOUT_MS: u64 = PING_INTERVAL_MS * 2 + 1_000;

/// Lifetime of a multicast membership assertion at the receiving peer
pub const MULTICAST_LIKE_EXPIRE_MS: u64 = 600_000;

/// TTL / hop limit for firewall openers
pub const FIREWALL_OPENER_HOPS: u32 = 2;

/// Peer session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Liveness window for `PathState::is_active`
    pub path_activity_timeout_ms: u64,
    /// Multicast membership expiry; announcements go out about twice per window
    pub multicast_like_expire_ms: u64,
    /// TTL / hop limit used by `send_firewall_opener`
    pub firewall_opener_hops: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            path_activity_timeout_ms: PATH_ACTIVITY_TIMEOUT_MS,
            multicast_like_expire_ms: MULTICAST_LIKE_EXPIRE_MS,
            firewall_opener_hops: FIREWALL_OPENER_HOPS,
        }
    }
}

impl PeerConfig {
    /// Minimum spacing between multicast announcements to one peer.
    #[must_use]
    pub const fn announce_interval_ms(&self) -> u64 {
        self.multicast_like_expire_ms / 2 - 1_000
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// `PeerError::InvalidConfig` if the activity timeout is zero, the
    /// multicast expiry is below two seconds, or the hop count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.path_activity_timeout_ms == 0 {
            return Err(PeerError::InvalidConfig(
                "path_activity_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.multicast_like_expire_ms < 2_000 {
            return Err(PeerError::InvalidConfig(format!(
                "multicast_like_expire_ms must be at least 2000, got {}",
                self.multicast_like_expire_ms
            )));
        }
        if self.firewall_opener_hops == 0 {
            return Err(PeerError::InvalidConfig(
                "firewall_opener_hops must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
