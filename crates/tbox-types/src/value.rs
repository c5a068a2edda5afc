//! Dynamically-typed field values and whole-tuple encode/decode.
//!
//! [`FieldValue`] is the in-memory form of one tuple field. It exists for
//! hosts and tests that build or inspect tuples; the engine itself works
//! on the encoded bytes and never materializes values.

use crate::wire::{
    self, ElementType, decode_array_header, element_type, next_element, write_array_header,
};

/// One field of a tuple, materialized.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit absence of a value.
    Nil,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer. Unsigned values above `i64::MAX` are not
    /// representable in this layer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw binary.
    Bin(Vec<u8>),
    /// Nested array.
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// The wire element type this value encodes to.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Nil => ElementType::Nil,
            Self::Bool(_) => ElementType::Bool,
            Self::Integer(_) => ElementType::Integer,
            Self::Float(_) => ElementType::Float,
            Self::Str(_) => ElementType::Str,
            Self::Bin(_) => ElementType::Bin,
            Self::Array(_) => ElementType::Array,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Nil => wire::write_nil(buf),
            Self::Bool(b) => wire::write_bool(buf, *b),
            Self::Integer(i) => wire::write_int(buf, *i),
            Self::Float(f) => wire::write_float(buf, *f),
            Self::Str(s) => wire::write_str(buf, s),
            Self::Bin(b) => wire::write_bin(buf, b),
            Self::Array(items) => {
                let len = u32::try_from(items.len()).expect("array length overflows u32");
                write_array_header(buf, len);
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }
}

/// Encode a sequence of values as one tuple: array header + elements.
#[must_use]
pub fn encode_tuple(values: &[FieldValue]) -> Vec<u8> {
    let mut buf = Vec::new();
    let len = u32::try_from(values.len()).expect("tuple field count overflows u32");
    write_array_header(&mut buf, len);
    for value in values {
        value.encode_into(&mut buf);
    }
    buf
}

/// Decode a complete tuple back into values.
///
/// Returns `None` on malformed input, trailing garbage, maps, or unsigned
/// integers above `i64::MAX`.
#[must_use]
pub fn decode_tuple(data: &[u8]) -> Option<Vec<FieldValue>> {
    let (count, header) = decode_array_header(data)?;
    let mut pos = header;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value, consumed) = decode_value(data.get(pos..)?)?;
        values.push(value);
        pos += consumed;
    }
    if pos != data.len() {
        return None;
    }
    Some(values)
}

#[allow(clippy::cast_possible_wrap)]
fn decode_value(buf: &[u8]) -> Option<(FieldValue, usize)> {
    let len = next_element(buf)?;
    let &tag = buf.first()?;
    let value = match element_type(tag)? {
        ElementType::Nil => FieldValue::Nil,
        ElementType::Bool => FieldValue::Bool(tag == 0xc3),
        ElementType::Integer => FieldValue::Integer(decode_integer(tag, &buf[1..len])?),
        ElementType::Float => FieldValue::Float(decode_float(tag, &buf[1..len])?),
        ElementType::Str => {
            let body = str_body(tag, &buf[..len])?;
            FieldValue::Str(std::str::from_utf8(body).ok()?.to_owned())
        }
        ElementType::Bin => {
            let skip = match tag {
                0xc4 => 2,
                0xc5 => 3,
                _ => 5,
            };
            FieldValue::Bin(buf[skip..len].to_vec())
        }
        ElementType::Array => {
            let (count, header) = decode_array_header(buf)?;
            let mut pos = header;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (item, consumed) = decode_value(&buf[pos..len])?;
                items.push(item);
                pos += consumed;
            }
            FieldValue::Array(items)
        }
        ElementType::Map => return None,
    };
    Some((value, len))
}

#[allow(clippy::cast_possible_wrap)]
fn decode_integer(tag: u8, body: &[u8]) -> Option<i64> {
    match tag {
        0x00..=0x7f => Some(i64::from(tag)),
        0xe0..=0xff => Some(i64::from(tag as i8)),
        0xcc => Some(i64::from(body[0])),
        0xcd => Some(i64::from(u16::from_be_bytes(body.try_into().ok()?))),
        0xce => Some(i64::from(u32::from_be_bytes(body.try_into().ok()?))),
        0xcf => {
            let raw = u64::from_be_bytes(body.try_into().ok()?);
            i64::try_from(raw).ok()
        }
        0xd0 => Some(i64::from(body[0] as i8)),
        0xd1 => Some(i64::from(i16::from_be_bytes(body.try_into().ok()?))),
        0xd2 => Some(i64::from(i32::from_be_bytes(body.try_into().ok()?))),
        0xd3 => Some(i64::from_be_bytes(body.try_into().ok()?)),
        _ => None,
    }
}

fn decode_float(tag: u8, body: &[u8]) -> Option<f64> {
    match tag {
        0xca => Some(f64::from(f32::from_bits(u32::from_be_bytes(
            body.try_into().ok()?,
        )))),
        0xcb => Some(f64::from_bits(u64::from_be_bytes(body.try_into().ok()?))),
        _ => None,
    }
}

fn str_body(tag: u8, element: &[u8]) -> Option<&[u8]> {
    let skip = match tag {
        0xa0..=0xbf => 1,
        0xd9 => 2,
        0xda => 3,
        0xdb => 5,
        _ => return None,
    };
    element.get(skip..)
}
