//! PackStream encoder.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use super::marker::*;
use super::types::{Structure, Value};
use super::PackStreamError;

/// PackStream encoder that writes values to a byte buffer.
///
/// Always emits the narrowest class that fits, and map entries in ascending
/// key order, so equal values always produce identical bytes.
#[derive(Debug)]
pub struct PackStreamEncoder {
    buffer: BytesMut,
}

impl PackStreamEncoder {
    /// Create a new encoder with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encoder with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> Result<(), PackStreamError> {
        match value {
            Value::Null => {
                self.buffer.put_u8(NULL);
                Ok(())
            }
            Value::Boolean(b) => {
                self.buffer.put_u8(if *b { TRUE } else { FALSE });
                Ok(())
            }
            Value::Integer(i) => {
                self.encode_int(*i);
                Ok(())
            }
            Value::Float(f) => {
                self.buffer.put_u8(FLOAT_64);
                self.buffer.put_f64(*f);
                Ok(())
            }
            Value::String(s) => self.encode_string(s),
            Value::List(l) => self.encode_list(l),
            Value::Map(m) => self.encode_map(m),
            Value::Structure(s) => self.encode_structure(s),
        }
    }

    /// Encode an integer using the smallest representation.
    pub fn encode_int(&mut self, value: i64) {
        if is_tiny_int(value) {
            self.buffer.put_u8(value as u8);
        } else if i8::try_from(value).is_ok() {
            self.buffer.put_u8(INT_8);
            self.buffer.put_i8(value as i8);
        } else if i16::try_from(value).is_ok() {
            self.buffer.put_u8(INT_16);
            self.buffer.put_i16(value as i16);
        } else if i32::try_from(value).is_ok() {
            self.buffer.put_u8(INT_32);
            self.buffer.put_i32(value as i32);
        } else {
            self.buffer.put_u8(INT_64);
            self.buffer.put_i64(value);
        }
    }

    pub fn encode_string(&mut self, value: &str) -> Result<(), PackStreamError> {
        let bytes = value.as_bytes();
        self.write_header(
            "string",
            bytes.len(),
            TINY_STRING,
            &[STRING_8, STRING_16, STRING_32],
        )?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    pub fn encode_list(&mut self, values: &[Value]) -> Result<(), PackStreamError> {
        self.write_header("list", values.len(), TINY_LIST, &[LIST_8, LIST_16, LIST_32])?;
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    pub fn encode_map(&mut self, map: &HashMap<String, Value>) -> Result<(), PackStreamError> {
        self.write_header("map", map.len(), TINY_MAP, &[MAP_8, MAP_16, MAP_32])?;

        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (key, value) in entries {
            self.encode_string(key)?;
            self.encode(value)?;
        }
        Ok(())
    }

    pub fn encode_structure(&mut self, s: &Structure) -> Result<(), PackStreamError> {
        self.write_header("structure", s.fields.len(), TINY_STRUCT, &[STRUCT_8, STRUCT_16])?;
        self.buffer.put_u8(s.signature);
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    /// Write a size header: the tiny marker when `size` fits in a nibble,
    /// otherwise the first of `prefixed` (8, 16, 32-bit markers) whose
    /// prefix can hold it.
    fn write_header(
        &mut self,
        kind: &'static str,
        size: usize,
        tiny: u8,
        prefixed: &[u8],
    ) -> Result<(), PackStreamError> {
        if size <= TINY_SIZE_MAX {
            self.buffer.put_u8(tiny | size as u8);
            return Ok(());
        }

        if size <= u8::MAX as usize {
            self.buffer.put_u8(prefixed[0]);
            self.buffer.put_u8(size as u8);
        } else if size <= u16::MAX as usize {
            self.buffer.put_u8(prefixed[1]);
            self.buffer.put_u16(size as u16);
        } else if size <= u32::MAX as usize && prefixed.len() > 2 {
            self.buffer.put_u8(prefixed[2]);
            self.buffer.put_u32(size as u32);
        } else {
            return Err(PackStreamError::ValueTooLarge(kind, size));
        }
        Ok(())
    }
}

impl Default for PackStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a single value.
pub fn encode(value: &Value) -> Result<BytesMut, PackStreamError> {
    let mut encoder = PackStreamEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(value: Value) -> Vec<u8> {
        encode(&value).unwrap().to_vec()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(bytes_of(Value::Null), [0xC0]);
        assert_eq!(bytes_of(Value::Boolean(true)), [0xC3]);
        assert_eq!(bytes_of(Value::Boolean(false)), [0xC2]);

        let float = bytes_of(Value::Float(1.0));
        assert_eq!(float, [0xC1, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_forty_two() {
        assert_eq!(bytes_of(Value::Integer(42)), [0x2A]);
    }

    #[test]
    fn test_integer_classes() {
        let cases: &[(i64, &[u8])] = &[
            (0, &[0x00]),
            (127, &[0x7F]),
            (-16, &[0xF0]),
            (-1, &[0xFF]),
            (-17, &[0xC8, 0xEF]),
            (-128, &[0xC8, 0x80]),
            (128, &[0xC9, 0x00, 0x80]),
            (1000, &[0xC9, 0x03, 0xE8]),
            (-129, &[0xC9, 0xFF, 0x7F]),
            (32768, &[0xCA, 0x00, 0x00, 0x80, 0x00]),
            (100000, &[0xCA, 0x00, 0x01, 0x86, 0xA0]),
            (2147483648, &[0xCB, 0, 0, 0, 0, 0x80, 0, 0, 0]),
        ];
        for (value, expected) in cases {
            assert_eq!(bytes_of(Value::Integer(*value)), *expected, "value {}", value);
        }
        assert_eq!(bytes_of(Value::Integer(i64::MIN)).len(), 9);
    }

    #[test]
    fn test_string_classes() {
        assert_eq!(bytes_of(Value::from("")), [0x80]);
        assert_eq!(bytes_of(Value::from("hello")), b"\x85hello");

        let s15 = bytes_of(Value::from("a".repeat(15)));
        assert_eq!(s15[0], 0x8F);
        assert_eq!(s15.len(), 16);

        let s16 = bytes_of(Value::from("a".repeat(16)));
        assert_eq!(&s16[..2], &[0xD0, 16]);

        let s255 = bytes_of(Value::from("a".repeat(255)));
        assert_eq!(&s255[..2], &[0xD0, 0xFF]);

        let s256 = bytes_of(Value::from("a".repeat(256)));
        assert_eq!(&s256[..3], &[0xD1, 0x01, 0x00]);

        let s65536 = bytes_of(Value::from("a".repeat(65536)));
        assert_eq!(&s65536[..5], &[0xD2, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_string_length_counts_bytes() {
        // five characters, ten UTF-8 bytes
        let encoded = bytes_of(Value::from("ééééé"));
        assert_eq!(encoded[0], 0x8A);
    }

    #[test]
    fn test_list_classes() {
        assert_eq!(bytes_of(Value::List(vec![])), [0x90]);
        assert_eq!(
            bytes_of(Value::List(vec![1.into(), 2.into(), 3.into()])),
            [0x93, 1, 2, 3]
        );

        let sixteen = bytes_of(Value::List(vec![Value::Null; 16]));
        assert_eq!(&sixteen[..2], &[0xD4, 16]);

        let big = bytes_of(Value::List(vec![Value::Null; 300]));
        assert_eq!(&big[..3], &[0xD5, 0x01, 0x2C]);
    }

    #[test]
    fn test_map_classes() {
        assert_eq!(bytes_of(Value::Map(HashMap::new())), [0xA0]);

        let mut one = HashMap::new();
        one.insert("a".to_string(), Value::Integer(1));
        assert_eq!(bytes_of(Value::Map(one)), [0xA1, 0x81, b'a', 0x01]);

        let many: HashMap<String, Value> =
            (0..20).map(|i| (format!("k{:02}", i), Value::Integer(i))).collect();
        let encoded = bytes_of(Value::Map(many));
        assert_eq!(&encoded[..2], &[0xD8, 20]);
    }

    #[test]
    fn test_map_keys_sorted() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), Value::Integer(2));
        map.insert("a".to_string(), Value::Integer(1));
        map.insert("c".to_string(), Value::Integer(3));
        assert_eq!(
            bytes_of(Value::Map(map)),
            [0xA3, 0x81, b'a', 1, 0x81, b'b', 2, 0x81, b'c', 3]
        );
    }

    #[test]
    fn test_structure_classes() {
        let s = Structure::new(0x4E, vec![Value::Integer(1)]);
        assert_eq!(bytes_of(Value::Structure(s)), [0xB1, 0x4E, 0x01]);

        let wide = Structure::new(0x01, vec![Value::Null; 16]);
        let encoded = bytes_of(Value::Structure(wide));
        assert_eq!(&encoded[..3], &[0xDC, 16, 0x01]);

        let wider = Structure::new(0x01, vec![Value::Null; 256]);
        let encoded = bytes_of(Value::Structure(wider));
        assert_eq!(&encoded[..4], &[0xDD, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_structure_too_large() {
        let huge = Structure::new(0x01, vec![Value::Null; 65536]);
        let err = encode(&Value::Structure(huge)).unwrap_err();
        assert!(matches!(err, PackStreamError::ValueTooLarge("structure", 65536)));
    }
}
