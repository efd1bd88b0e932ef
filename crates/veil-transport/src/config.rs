//! Stream channel configuration.

use crate::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use veil_obfuscation::{MAX_RECORD_PAYLOAD, RECORD_HEADER_SIZE};

/// Default maximum payload of a single framed message
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 16384;

/// Stream channel sizing.
///
/// All buffer limits derive from `max_message_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum payload per message; also the send-queue growth step
    pub max_message_len: usize,
    /// Send queue cap as a multiple of `max_message_len`
    pub send_queue_multiplier: usize,
    /// Input accumulator capacity as a multiple of `max_message_len`
    pub input_buffer_multiplier: usize,
    /// Bytes requested from the socket per read notification
    pub read_chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            send_queue_multiplier: 8,
            input_buffer_multiplier: 4,
            read_chunk_size: 64 * 1024,
        }
    }
}

impl StreamConfig {
    /// Hard cap on bytes queued for sending.
    ///
    /// Saturates for configurations that `validate` rejects.
    #[must_use]
    pub const fn max_send_queue_len(&self) -> usize {
        self.max_message_len.saturating_mul(self.send_queue_multiplier)
    }

    /// Fixed capacity of the input accumulator.
    ///
    /// Saturates for configurations that `validate` rejects.
    #[must_use]
    pub const fn input_capacity(&self) -> usize {
        self.max_message_len.saturating_mul(self.input_buffer_multiplier)
    }

    fn buffer_len(&self, name: &str, multiplier: usize) -> TransportResult<usize> {
        self.max_message_len.checked_mul(multiplier).ok_or_else(|| {
            TransportError::InvalidConfig(format!(
                "{name} of {multiplier} overflows with max_message_len {}",
                self.max_message_len
            ))
        })
    }

    /// Check that the limits are consistent.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` when a limit is zero, when the
    /// message length does not fit the record length field, when a buffer
    /// size overflows, or when either buffer cannot hold one maximum-size
    /// frame.
    pub fn validate(&self) -> TransportResult<()> {
        if self.max_message_len == 0 || self.max_message_len > MAX_RECORD_PAYLOAD {
            return Err(TransportError::InvalidConfig(format!(
                "max_message_len must be in 1..={MAX_RECORD_PAYLOAD}, got {}",
                self.max_message_len
            )));
        }
        if self.read_chunk_size == 0 {
            return Err(TransportError::InvalidConfig(
                "read_chunk_size must be non-zero".to_string(),
            ));
        }
        let largest_frame = self.max_message_len + RECORD_HEADER_SIZE;
        let queue_cap = self.buffer_len("send_queue_multiplier", self.send_queue_multiplier)?;
        if queue_cap < largest_frame {
            return Err(TransportError::InvalidConfig(format!(
                "send queue cap {queue_cap} cannot hold a {largest_frame}-byte frame"
            )));
        }
        let input_cap = self.buffer_len("input_buffer_multiplier", self.input_buffer_multiplier)?;
        if input_cap < largest_frame {
            return Err(TransportError::InvalidConfig(format!(
                "input capacity {input_cap} cannot hold a {largest_frame}-byte frame"
            )));
        }
        Ok(())
    }
}
