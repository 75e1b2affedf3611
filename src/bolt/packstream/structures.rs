//! Known graph-entity structure signatures.
//!
//! Entities are decoded as plain [`Structure`]s; the decoder only checks that
//! a known signature arrives with the field count it is defined with.

use super::types::Structure;
use super::PackStreamError;

/// Node: id, labels, properties
pub const NODE: u8 = 0x4E; // 'N'
/// Relationship: id, start node id, end node id, type, properties
pub const RELATIONSHIP: u8 = 0x52; // 'R'
/// Unbound relationship: id, type, properties
pub const UNBOUND_RELATIONSHIP: u8 = 0x72; // 'r'
/// Path: nodes, unbound relationships, sequence
pub const PATH: u8 = 0x50; // 'P'

/// Field count a graph-entity signature is defined with, if the signature is known.
pub fn entity_field_count(signature: u8) -> Option<usize> {
    match signature {
        NODE => Some(3),
        RELATIONSHIP => Some(5),
        UNBOUND_RELATIONSHIP => Some(3),
        PATH => Some(3),
        _ => None,
    }
}

/// Human-readable name for a graph-entity signature.
pub fn entity_name(signature: u8) -> Option<&'static str> {
    match signature {
        NODE => Some("Node"),
        RELATIONSHIP => Some("Relationship"),
        UNBOUND_RELATIONSHIP => Some("UnboundRelationship"),
        PATH => Some("Path"),
        _ => None,
    }
}

/// Check a decoded structure against the entity table.
pub fn check_entity(s: &Structure) -> Result<(), PackStreamError> {
    match entity_field_count(s.signature) {
        Some(expected) if expected != s.fields.len() => Err(PackStreamError::FieldCount {
            signature: s.signature,
            expected,
            actual: s.fields.len(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::packstream::Value;
    use std::collections::HashMap;

    #[test]
    fn test_known_signatures() {
        assert_eq!(entity_field_count(NODE), Some(3));
        assert_eq!(entity_field_count(RELATIONSHIP), Some(5));
        assert_eq!(entity_field_count(UNBOUND_RELATIONSHIP), Some(3));
        assert_eq!(entity_field_count(PATH), Some(3));
        assert_eq!(entity_field_count(0x01), None);
        assert_eq!(entity_name(NODE), Some("Node"));
    }

    #[test]
    fn test_check_entity() {
        let node = Structure::new(
            NODE,
            vec![
                Value::Integer(1),
                Value::List(vec![Value::from("Person")]),
                Value::Map(HashMap::new()),
            ],
        );
        assert!(check_entity(&node).is_ok());

        let short = Structure::new(NODE, vec![Value::Integer(1)]);
        assert!(matches!(
            check_entity(&short),
            Err(PackStreamError::FieldCount { signature: NODE, expected: 3, actual: 1 })
        ));

        // unknown signatures are not checked
        assert!(check_entity(&Structure::new(0x33, vec![])).is_ok());
    }
}
