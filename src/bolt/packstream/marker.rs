//! PackStream marker bytes.
//!
//! Every encoded value starts with a marker byte. For tiny classes the marker
//! also carries the value (tiny int) or the size (string, list, map, struct)
//! in its low nibble.

/// Null marker
pub const NULL: u8 = 0xC0;

/// Float marker (64-bit IEEE 754, big-endian)
pub const FLOAT_64: u8 = 0xC1;

/// Boolean markers
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

/// Integer markers
pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

/// Smallest and largest integers that fit in the marker byte itself.
pub const TINY_INT_MIN: i64 = -16;
pub const TINY_INT_MAX: i64 = 127;

/// Tiny class bases; the low nibble holds a size of 0..=15.
pub const TINY_STRING: u8 = 0x80;
pub const TINY_LIST: u8 = 0x90;
pub const TINY_MAP: u8 = 0xA0;
pub const TINY_STRUCT: u8 = 0xB0;

/// Largest size expressible in a tiny marker.
pub const TINY_SIZE_MAX: usize = 15;

/// String markers
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

/// List markers
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

/// Map markers
pub const MAP_8: u8 = 0xD8;
pub const MAP_16: u8 = 0xD9;
pub const MAP_32: u8 = 0xDA;

/// Structure markers (no 32-bit class)
pub const STRUCT_8: u8 = 0xDC;
pub const STRUCT_16: u8 = 0xDD;

/// How the size of a sized value is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    /// Size embedded in the marker's low nibble
    Tiny(usize),
    /// Size follows the marker as a big-endian unsigned integer of this many bytes
    Prefixed(usize),
}

/// Meaning of a marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Null,
    Boolean(bool),
    Float,
    /// Integer embedded in the marker
    TinyInt(i8),
    /// Integer of the given byte width follows
    Int(usize),
    String(Size),
    List(Size),
    Map(Size),
    Struct(Size),
    /// Not part of the supported encoding
    Unknown(u8),
}

/// Classify a marker byte.
pub fn classify(byte: u8) -> Marker {
    match byte {
        0x00..=0x7F | 0xF0..=0xFF => Marker::TinyInt(byte as i8),
        0x80..=0x8F => Marker::String(Size::Tiny(low_nibble(byte))),
        0x90..=0x9F => Marker::List(Size::Tiny(low_nibble(byte))),
        0xA0..=0xAF => Marker::Map(Size::Tiny(low_nibble(byte))),
        0xB0..=0xBF => Marker::Struct(Size::Tiny(low_nibble(byte))),
        NULL => Marker::Null,
        FLOAT_64 => Marker::Float,
        FALSE => Marker::Boolean(false),
        TRUE => Marker::Boolean(true),
        INT_8 => Marker::Int(1),
        INT_16 => Marker::Int(2),
        INT_32 => Marker::Int(4),
        INT_64 => Marker::Int(8),
        STRING_8 => Marker::String(Size::Prefixed(1)),
        STRING_16 => Marker::String(Size::Prefixed(2)),
        STRING_32 => Marker::String(Size::Prefixed(4)),
        LIST_8 => Marker::List(Size::Prefixed(1)),
        LIST_16 => Marker::List(Size::Prefixed(2)),
        LIST_32 => Marker::List(Size::Prefixed(4)),
        MAP_8 => Marker::Map(Size::Prefixed(1)),
        MAP_16 => Marker::Map(Size::Prefixed(2)),
        MAP_32 => Marker::Map(Size::Prefixed(4)),
        STRUCT_8 => Marker::Struct(Size::Prefixed(1)),
        STRUCT_16 => Marker::Struct(Size::Prefixed(2)),
        other => Marker::Unknown(other),
    }
}

#[inline]
fn low_nibble(byte: u8) -> usize {
    (byte & 0x0F) as usize
}

/// Check if an integer can be encoded in the marker byte.
#[inline]
pub fn is_tiny_int(value: i64) -> bool {
    (TINY_INT_MIN..=TINY_INT_MAX).contains(&value)
}
