//! PackStream decoder.

use bytes::Buf;
use std::collections::HashMap;

use super::marker::{classify, Marker, Size};
use super::structures::check_entity;
use super::types::{Structure, Value};
use super::PackStreamError;

/// Deepest nesting of lists, maps and structures the decoder accepts.
pub const MAX_DEPTH: usize = 256;

/// PackStream decoder that reads values from a byte buffer.
pub struct PackStreamDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    /// Containers currently open
    depth: usize,
}

impl<'a> PackStreamDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, depth: 0 }
    }

    /// Get the current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes count.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> Result<Value, PackStreamError> {
        let byte = self.read_u8()?;

        match classify(byte) {
            Marker::Null => Ok(Value::Null),
            Marker::Boolean(b) => Ok(Value::Boolean(b)),
            Marker::Float => Ok(Value::Float(self.read_f64()?)),
            Marker::TinyInt(i) => Ok(Value::Integer(i as i64)),
            Marker::Int(1) => Ok(Value::Integer(self.read_i8()? as i64)),
            Marker::Int(2) => Ok(Value::Integer(self.read_i16()? as i64)),
            Marker::Int(4) => Ok(Value::Integer(self.read_i32()? as i64)),
            Marker::Int(_) => Ok(Value::Integer(self.read_i64()?)),
            Marker::String(size) => {
                let len = self.read_size(size)?;
                Ok(Value::String(self.read_string_data(len)?))
            }
            Marker::List(size) => {
                let len = self.read_size(size)?;
                self.enter()?;
                let list = self.read_list_data(len);
                self.depth -= 1;
                list
            }
            Marker::Map(size) => {
                let len = self.read_size(size)?;
                self.enter()?;
                let map = self.read_map_data(len);
                self.depth -= 1;
                map
            }
            Marker::Struct(size) => {
                let len = self.read_size(size)?;
                self.enter()?;
                let s = self.read_struct_data(len);
                self.depth -= 1;
                let s = s?;
                check_entity(&s)?;
                Ok(Value::Structure(s))
            }
            Marker::Unknown(m) => Err(PackStreamError::UnknownMarker(m)),
        }
    }

    fn enter(&mut self) -> Result<(), PackStreamError> {
        if self.depth >= MAX_DEPTH {
            return Err(PackStreamError::NestingTooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_size(&mut self, size: Size) -> Result<usize, PackStreamError> {
        match size {
            Size::Tiny(n) => Ok(n),
            Size::Prefixed(1) => Ok(self.read_u8()? as usize),
            Size::Prefixed(2) => Ok(self.read_u16()? as usize),
            Size::Prefixed(_) => Ok(self.read_u32()? as usize),
        }
    }

    fn read_string_data(&mut self, len: usize) -> Result<String, PackStreamError> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))
    }

    fn read_list_data(&mut self, len: usize) -> Result<Value, PackStreamError> {
        // a declared length is only trusted as far as the input could hold it
        let mut list = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            list.push(self.decode()?);
        }
        Ok(Value::List(list))
    }

    fn read_map_data(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let mut map = HashMap::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            let key = match self.decode()? {
                Value::String(s) => s,
                _ => return Err(PackStreamError::InvalidMapKey),
            };
            let value = self.decode()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn read_struct_data(&mut self, len: usize) -> Result<Structure, PackStreamError> {
        let signature = self.read_u8()?;
        let mut fields = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            fields.push(self.decode()?);
        }
        Ok(Structure::new(signature, fields))
    }

    /// Read a message: exactly one structure filling the whole input.
    ///
    /// The signature is not checked here; message-level field counts are
    /// validated where the signature is interpreted.
    pub fn decode_message(&mut self) -> Result<Structure, PackStreamError> {
        let byte = self.read_u8()?;
        let s = match classify(byte) {
            Marker::Struct(size) => {
                let len = self.read_size(size)?;
                self.read_struct_data(len)?
            }
            Marker::Unknown(m) => return Err(PackStreamError::UnknownMarker(m)),
            _ => {
                self.pos -= 1;
                let value = self.decode()?;
                return Err(PackStreamError::NotAStructure(value.type_name()));
            }
        };

        if !self.is_empty() {
            return Err(PackStreamError::TrailingBytes(self.remaining()));
        }
        Ok(s)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        if self.remaining() < len {
            return Err(PackStreamError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        Ok(self.take(1)?[0])
    }

    fn read_i8(&mut self) -> Result<i8, PackStreamError> {
        Ok(self.take(1)?.get_i8())
    }

    fn read_u16(&mut self) -> Result<u16, PackStreamError> {
        Ok(self.take(2)?.get_u16())
    }

    fn read_i16(&mut self) -> Result<i16, PackStreamError> {
        Ok(self.take(2)?.get_i16())
    }

    fn read_u32(&mut self) -> Result<u32, PackStreamError> {
        Ok(self.take(4)?.get_u32())
    }

    fn read_i32(&mut self) -> Result<i32, PackStreamError> {
        Ok(self.take(4)?.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64, PackStreamError> {
        Ok(self.take(8)?.get_i64())
    }

    fn read_f64(&mut self) -> Result<f64, PackStreamError> {
        Ok(self.take(8)?.get_f64())
    }
}

/// Decode a single value from bytes.
pub fn decode(data: &[u8]) -> Result<Value, PackStreamError> {
    PackStreamDecoder::new(data).decode()
}

/// Decode a complete message body into its structure.
pub fn decode_message(data: &[u8]) -> Result<Structure, PackStreamError> {
    PackStreamDecoder::new(data).decode_message()
}

/// Signature of a message body, read without decoding its fields.
pub fn message_signature(data: &[u8]) -> Option<u8> {
    let mut decoder = PackStreamDecoder::new(data);
    match classify(decoder.read_u8().ok()?) {
        Marker::Struct(size) => {
            decoder.read_size(size).ok()?;
            decoder.read_u8().ok()
        }
        _ => None,
    }
}
