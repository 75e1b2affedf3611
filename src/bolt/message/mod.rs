//! Bolt protocol message types.
//!
//! Every message is a PackStream structure whose signature names the verb.
//! This module implements the Bolt v1 request and response set.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

use crate::bolt::packstream::{PackStreamError, Structure};

/// Bolt message signatures.
pub mod tag {
    /// INIT message tag (0x01)
    pub const INIT: u8 = 0x01;
    /// ACK_FAILURE message tag (0x0E)
    pub const ACK_FAILURE: u8 = 0x0E;
    /// RESET message tag (0x0F)
    pub const RESET: u8 = 0x0F;
    /// RUN message tag (0x10)
    pub const RUN: u8 = 0x10;
    /// DISCARD_ALL message tag (0x2F)
    pub const DISCARD_ALL: u8 = 0x2F;
    /// PULL_ALL message tag (0x3F)
    pub const PULL_ALL: u8 = 0x3F;

    /// SUCCESS response tag (0x70)
    pub const SUCCESS: u8 = 0x70;
    /// RECORD response tag (0x71)
    pub const RECORD: u8 = 0x71;
    /// IGNORED response tag (0x7E)
    pub const IGNORED: u8 = 0x7E;
    /// FAILURE response tag (0x7F)
    pub const FAILURE: u8 = 0x7F;
}

/// Fixed field count of each message signature.
pub fn field_count(signature: u8) -> Option<usize> {
    match signature {
        tag::INIT | tag::RUN => Some(2),
        tag::PULL_ALL | tag::DISCARD_ALL | tag::ACK_FAILURE | tag::RESET | tag::IGNORED => Some(0),
        tag::SUCCESS | tag::RECORD | tag::FAILURE => Some(1),
        _ => None,
    }
}

/// Check a message structure's field count against its signature.
pub(crate) fn check_field_count(s: &Structure) -> Result<(), PackStreamError> {
    match field_count(s.signature) {
        Some(expected) if expected != s.fields.len() => Err(PackStreamError::FieldCount {
            signature: s.signature,
            expected,
            actual: s.fields.len(),
        }),
        Some(_) => Ok(()),
        None => Err(PackStreamError::InvalidStructure(format!(
            "Unknown message signature: 0x{:02X}",
            s.signature
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::tag::*;
    use super::*;

    #[test]
    fn test_request_tags() {
        assert_eq!(INIT, 0x01);
        assert_eq!(RUN, 0x10);
        assert_eq!(PULL_ALL, 0x3F);
        assert_eq!(DISCARD_ALL, 0x2F);
        assert_eq!(ACK_FAILURE, 0x0E);
        assert_eq!(RESET, 0x0F);
    }

    #[test]
    fn test_response_tags() {
        assert_eq!(SUCCESS, 0x70);
        assert_eq!(RECORD, 0x71);
        assert_eq!(IGNORED, 0x7E);
        assert_eq!(FAILURE, 0x7F);
    }

    #[test]
    fn test_check_field_count() {
        assert!(check_field_count(&Structure::new(RESET, vec![])).is_ok());
        assert_eq!(
            check_field_count(&Structure::new(SUCCESS, vec![])),
            Err(PackStreamError::FieldCount { signature: SUCCESS, expected: 1, actual: 0 })
        );
        assert!(matches!(
            check_field_count(&Structure::new(0x02, vec![])),
            Err(PackStreamError::InvalidStructure(_))
        ));
    }
}
