//! TLS application-data record mimicry.
//!
//! Each message is carried in a record that looks like TLS 1.2/1.3
//! application data to middleboxes that only pass recognisable encrypted
//! traffic:
//!
//! ```text
//! +------+------+------+--------+--------+-----------------+
//! | 0x17 | 0x03 | 0x03 | len_hi | len_lo | payload[len]    |
//! +------+------+------+--------+--------+-----------------+
//! ```
//!
//! No handshake is emitted or understood. A stream whose first byte is not
//! the application-data content type is unsupported framing.

use thiserror::Error;

/// TLS content type: Application Data
pub const CONTENT_TYPE_APPLICATION_DATA: u8 = 0x17;
/// Legacy TLS version carried in every record
pub const RECORD_VERSION: u16 = 0x0303;
/// Record header size in bytes
pub const RECORD_HEADER_SIZE: usize = 5;
/// Largest payload expressible in the 16-bit length field
pub const MAX_RECORD_PAYLOAD: usize = u16::MAX as usize;

/// Record codec errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Fewer than `RECORD_HEADER_SIZE` bytes
    #[error("record too short")]
    TooShort,

    /// First byte is not the application-data content type
    #[error("unsupported record content type 0x{0:02x}")]
    UnsupportedContentType(u8),

    /// Version bytes are not `RECORD_VERSION`
    #[error("unsupported record version 0x{0:04x}")]
    UnsupportedVersion(u16),

    /// Header announces more payload than is present
    #[error("incomplete record: need {needed} bytes, have {available}")]
    Incomplete {
        /// Total record size announced by the header
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// Payload does not fit the 16-bit length field
    #[error("payload of {0} bytes exceeds record limit")]
    PayloadTooLarge(usize),
}

/// Parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Legacy version bytes, always `RECORD_VERSION` on the wire
    pub version: u16,
    /// Payload length
    pub payload_len: u16,
}

impl RecordHeader {
    /// Header for an application-data record carrying `payload_len` bytes.
    #[must_use]
    pub const fn application_data(payload_len: u16) -> Self {
        Self {
            version: RECORD_VERSION,
            payload_len,
        }
    }

    /// Encode to the 5-byte wire form.
    #[must_use]
    pub const fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let v = self.version.to_be_bytes();
        let l = self.payload_len.to_be_bytes();
        [CONTENT_TYPE_APPLICATION_DATA, v[0], v[1], l[0], l[1]]
    }

    /// Parse the first `RECORD_HEADER_SIZE` bytes of `buf`.
    ///
    /// The content type and version must match what [`encode`](Self::encode)
    /// writes for application data.
    ///
    /// # Errors
    ///
    /// `RecordError::TooShort`, `RecordError::UnsupportedContentType` or
    /// `RecordError::UnsupportedVersion`.
    pub fn parse(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < RECORD_HEADER_SIZE {
            return Err(RecordError::TooShort);
        }
        if buf[0] != CONTENT_TYPE_APPLICATION_DATA {
            return Err(RecordError::UnsupportedContentType(buf[0]));
        }
        let version = u16::from_be_bytes([buf[1], buf[2]]);
        if version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            payload_len: u16::from_be_bytes([buf[3], buf[4]]),
        })
    }

    /// Total record size (header plus payload).
    #[must_use]
    pub const fn record_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload_len as usize
    }
}

/// Wraps and unwraps whole disguise records.
///
/// # Examples
///
/// ```
/// use veil_obfuscation::tls_mimicry::DisguiseRecordCodec;
///
/// let codec = DisguiseRecordCodec::new();
/// let mut record = Vec::new();
/// codec.wrap_into(&mut record, b"hello world").unwrap();
/// assert_eq!(&record[..3], &[0x17, 0x03, 0x03]);
///
/// let payload = codec.unwrap(&record).unwrap();
/// assert_eq!(payload, b"hello world");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DisguiseRecordCodec;

impl DisguiseRecordCodec {
    /// Create a new codec
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Append a record carrying `payload` to `out`.
    ///
    /// `out` is left untouched on error.
    ///
    /// # Errors
    ///
    /// `RecordError::PayloadTooLarge` if `payload` exceeds `MAX_RECORD_PAYLOAD`.
    pub fn wrap_into(&self, out: &mut Vec<u8>, payload: &[u8]) -> Result<(), RecordError> {
        let len = u16::try_from(payload.len())
            .map_err(|_| RecordError::PayloadTooLarge(payload.len()))?;
        out.extend_from_slice(&RecordHeader::application_data(len).encode());
        out.extend_from_slice(payload);
        Ok(())
    }

    /// Borrow the payload of the record at the start of `record`.
    ///
    /// Trailing bytes after the record are ignored.
    ///
    /// # Errors
    ///
    /// Any header error, or `RecordError::Incomplete` if the payload is cut
    /// short.
    pub fn unwrap<'a>(&self, record: &'a [u8]) -> Result<&'a [u8], RecordError> {
        let header = RecordHeader::parse(record)?;
        let needed = header.record_len();
        if record.len() < needed {
            return Err(RecordError::Incomplete {
                needed,
                available: record.len(),
            });
        }
        Ok(&record[RECORD_HEADER_SIZE..needed])
    }
}
