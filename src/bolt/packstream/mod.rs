//! PackStream serialization format.
//!
//! PackStream is the binary serialization format used by the Bolt protocol
//! to encode values for transmission between client and server.
//!
//! # Supported Types
//!
//! - **Null**: Single byte marker
//! - **Boolean**: True/False markers
//! - **Integer**: Variable-length encoding (-2^63 to 2^63-1)
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8 encoded, variable length prefix
//! - **List**: Heterogeneous collections
//! - **Map**: String keys to arbitrary values
//! - **Structure**: Signature byte plus fields (graph entities and messages)
//!
//! The encoder always picks the narrowest class and writes map entries in
//! ascending key order. The decoder accepts any class.

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod structures;
pub mod types;

pub use decoder::{decode, decode_message, message_signature, PackStreamDecoder, MAX_DEPTH};
pub use encoder::{encode, PackStreamEncoder};
pub use types::{Structure, Value};

use std::fmt;

/// PackStream errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PackStreamError {
    /// Unexpected end of input
    UnexpectedEof,
    /// Unknown marker byte
    UnknownMarker(u8),
    /// Invalid UTF-8 in string
    InvalidUtf8(String),
    /// Invalid map key (must be string)
    InvalidMapKey,
    /// Value too large to encode
    ValueTooLarge(&'static str, usize),
    /// Known signature arrived with the wrong number of fields
    FieldCount {
        signature: u8,
        expected: usize,
        actual: usize,
    },
    /// Bytes left over after a complete message
    TrailingBytes(usize),
    /// A message body that is not a structure
    NotAStructure(&'static str),
    /// Invalid structure format
    InvalidStructure(String),
    /// Containers nested deeper than the decoder allows
    NestingTooDeep(usize),
}

impl PackStreamError {
    /// Whether the error leaves the byte stream in an unknown position.
    ///
    /// Only an unknown marker does: every other error is confined to the
    /// message it occurred in, because framing already delimited it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PackStreamError::UnknownMarker(_))
    }
}

impl fmt::Display for PackStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackStreamError::UnexpectedEof => write!(f, "Unexpected end of PackStream data"),
            PackStreamError::UnknownMarker(m) => write!(f, "Unknown PackStream marker: 0x{:02X}", m),
            PackStreamError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in string: {}", e),
            PackStreamError::InvalidMapKey => write!(f, "Map keys must be strings"),
            PackStreamError::ValueTooLarge(t, s) => write!(f, "{} too large: {} entries", t, s),
            PackStreamError::FieldCount {
                signature,
                expected,
                actual,
            } => write!(
                f,
                "Structure 0x{:02X} expects {} fields, got {}",
                signature, expected, actual
            ),
            PackStreamError::TrailingBytes(n) => {
                write!(f, "{} trailing bytes after message", n)
            }
            PackStreamError::NotAStructure(t) => write!(f, "Expected a message structure, got {}", t),
            PackStreamError::InvalidStructure(msg) => write!(f, "Invalid structure: {}", msg),
            PackStreamError::NestingTooDeep(max) => {
                write!(f, "Values nested deeper than {} levels", max)
            }
        }
    }
}

impl std::error::Error for PackStreamError {}
