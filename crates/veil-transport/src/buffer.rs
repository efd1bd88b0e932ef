//! Byte buffers backing a stream channel.
//!
//! [`OutputQueue`] holds framed bytes waiting for the socket. It grows in
//! fixed steps up to a hard cap and never shrinks. [`InputAccumulator`] holds
//! received bytes until a whole record is present; its capacity is fixed at
//! construction.

use veil_obfuscation::{DisguiseRecordCodec, RECORD_HEADER_SIZE, RecordError};

/// Growable send queue with a hard cap.
#[derive(Debug)]
pub struct OutputQueue {
    buf: Vec<u8>,
    /// Logical allocation, always a multiple of `growth_step`
    allocated: usize,
    growth_step: usize,
    cap: usize,
    codec: DisguiseRecordCodec,
}

impl OutputQueue {
    /// Create an empty queue growing by `growth_step` up to `cap` bytes.
    #[must_use]
    pub fn new(growth_step: usize, cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            allocated: 0,
            growth_step,
            cap,
            codec: DisguiseRecordCodec::new(),
        }
    }

    /// Make room for `additional` more bytes.
    ///
    /// Grows the allocation one step at a time until it fits. Returns `false`
    /// without touching the queue if that would pass the cap.
    #[must_use]
    pub fn reserve_for(&mut self, additional: usize) -> bool {
        let needed = self.buf.len() + additional;
        if needed <= self.allocated {
            return true;
        }

        let mut new_size = self.allocated;
        while new_size < needed {
            new_size += self.growth_step;
        }
        if new_size > self.cap {
            return false;
        }

        self.buf.reserve_exact(new_size - self.buf.len());
        self.allocated = new_size;
        true
    }

    /// Append one disguise record. Room must already be reserved.
    ///
    /// # Errors
    ///
    /// `RecordError::PayloadTooLarge` if `payload` does not fit the 16-bit
    /// length field. The queue is left unchanged.
    pub fn push_record(&mut self, payload: &[u8]) -> Result<(), RecordError> {
        debug_assert!(self.buf.len() + RECORD_HEADER_SIZE + payload.len() <= self.allocated);
        self.codec.wrap_into(&mut self.buf, payload)
    }

    /// Drop the first `n` written bytes, shifting the remainder to the front.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    /// Pending bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Number of pending bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current logical allocation.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Hard cap on pending bytes.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }
}

/// Fixed-capacity receive accumulator.
///
/// Tracks the length of the record currently being assembled once its
/// header has arrived.
#[derive(Debug)]
pub struct InputAccumulator {
    buf: Box<[u8]>,
    len: usize,
    frame_len: Option<usize>,
}

impl InputAccumulator {
    /// Create an empty accumulator holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            frame_len: None,
        }
    }

    /// Append one byte. Returns `false` if the accumulator is already full.
    #[must_use]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len >= self.buf.len() {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    /// Discard the first `n` bytes and shift the rest to the front.
    ///
    /// Also forgets the current frame length, which described the bytes
    /// just consumed.
    pub fn consume_front(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
        self.frame_len = None;
    }

    /// Accumulated bytes.
    #[must_use]
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of accumulated bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Full length (header included) of the record being assembled.
    #[must_use]
    pub fn frame_len(&self) -> Option<usize> {
        self.frame_len
    }

    /// Record the full length of the record being assembled.
    pub fn set_frame_len(&mut self, len: usize) {
        self.frame_len = Some(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_obfuscation::MAX_RECORD_PAYLOAD;

    #[test]
    fn test_output_grows_in_steps() {
        let mut queue = OutputQueue::new(100, 800);
        assert_eq!(queue.allocated(), 0);

        assert!(queue.reserve_for(10));
        assert_eq!(queue.allocated(), 100);

        assert!(queue.reserve_for(250));
        assert_eq!(queue.allocated(), 300);

        // Already fits, no growth
        assert!(queue.reserve_for(50));
        assert_eq!(queue.allocated(), 300);
    }

    #[test]
    fn test_output_cap_rejects_without_change() {
        let mut queue = OutputQueue::new(100, 200);
        assert!(queue.reserve_for(95));
        queue.push_record(&[7u8; 90]).unwrap();
        let before = queue.as_slice().to_vec();

        assert!(!queue.reserve_for(RECORD_HEADER_SIZE + 120));
        assert_eq!(queue.as_slice(), &before[..]);
        assert_eq!(queue.allocated(), 100);
    }

    #[test]
    fn test_output_exact_cap_accepted() {
        let mut queue = OutputQueue::new(100, 200);
        assert!(queue.reserve_for(200));
        assert_eq!(queue.allocated(), 200);
    }

    #[test]
    fn test_push_record_layout() {
        let mut queue = OutputQueue::new(64, 512);
        assert!(queue.reserve_for(RECORD_HEADER_SIZE + 3));
        queue.push_record(b"abc").unwrap();
        assert_eq!(queue.as_slice(), &[0x17, 0x03, 0x03, 0x00, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn test_push_record_rejects_oversized_payload() {
        let cap = 2 * (RECORD_HEADER_SIZE + MAX_RECORD_PAYLOAD);
        let mut queue = OutputQueue::new(1024, cap);
        assert!(queue.reserve_for(RECORD_HEADER_SIZE + 2));
        queue.push_record(b"ok").unwrap();
        let before = queue.as_slice().to_vec();

        let big = vec![0u8; MAX_RECORD_PAYLOAD + 1];
        assert!(queue.reserve_for(RECORD_HEADER_SIZE + big.len()));
        assert_eq!(
            queue.push_record(&big),
            Err(RecordError::PayloadTooLarge(MAX_RECORD_PAYLOAD + 1))
        );
        assert_eq!(queue.as_slice(), &before[..]);
    }

    #[test]
    fn test_output_consume_shifts_remainder() {
        let mut queue = OutputQueue::new(64, 512);
        assert!(queue.reserve_for(RECORD_HEADER_SIZE + 4));
        queue.push_record(b"wxyz").unwrap();

        queue.consume(6);
        assert_eq!(queue.as_slice(), b"xyz");

        queue.consume(100);
        assert!(queue.is_empty());
        // Allocation is kept for reuse
        assert_eq!(queue.allocated(), 64);
    }

    #[test]
    fn test_input_push_until_full() {
        let mut input = InputAccumulator::new(4);
        for b in 0..4u8 {
            assert!(input.push(b));
        }
        assert!(!input.push(9));
        assert_eq!(input.filled(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_input_consume_front() {
        let mut input = InputAccumulator::new(16);
        for b in 1..=6u8 {
            assert!(input.push(b));
        }
        input.set_frame_len(4);

        input.consume_front(4);
        assert_eq!(input.filled(), &[5, 6]);
        assert_eq!(input.frame_len(), None);

        input.consume_front(2);
        assert!(input.is_empty());
        assert_eq!(input.capacity(), 16);
    }
}
