//! # Veil Obfuscation
//!
//! Traffic disguise layer for the Veil overlay.
//!
//! Stream connections carry each message in a fake TLS application-data
//! record so that middleboxes filtering on apparent protocol let them pass.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod tls_mimicry;

pub use tls_mimicry::{
    CONTENT_TYPE_APPLICATION_DATA, DisguiseRecordCodec, MAX_RECORD_PAYLOAD, RECORD_HEADER_SIZE,
    RECORD_VERSION, RecordError, RecordHeader,
};
