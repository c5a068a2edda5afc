//! Stored tuples and reference handles.
//!
//! A stored tuple pairs its encoded bytes with a precomputed field map:
//! a sequence of `u32` byte offsets addressed by *negative* slot numbers
//! assigned at format-construction time. Slot `-1` is the last entry of
//! the map, `-2` the one before it, and so on — the map grows backwards
//! from the tuple body, exactly as it is laid out in memory ahead of the
//! body in the original engine.

use std::rc::Rc;

use crate::wire::{decode_array_header, next_element};

/// A validated, stored tuple: field map plus encoded bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct Tuple {
    field_map: Vec<u32>,
    data: Vec<u8>,
}

/// Shared handle to a stored tuple. One clone is one owned reference;
/// dropping the clone releases it.
pub type TupleRef = Rc<Tuple>;

impl Tuple {
    /// Assemble a tuple from an already-initialized field map and its
    /// encoded bytes.
    #[must_use]
    pub fn new(field_map: Vec<u32>, data: Vec<u8>) -> Self {
        Self { field_map, data }
    }

    /// The encoded bytes (array header + elements).
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The field map entries, in memory order.
    #[inline]
    #[must_use]
    pub fn field_map(&self) -> &[u32] {
        &self.field_map
    }

    /// Number of fields in the encoded array, if well-formed.
    #[must_use]
    pub fn field_count(&self) -> Option<u32> {
        decode_array_header(&self.data).map(|(count, _)| count)
    }

    /// Byte offset stored for a negative `slot`, or `None` when the slot
    /// is out of the map's range.
    #[must_use]
    pub fn offset_at_slot(&self, slot: i32) -> Option<u32> {
        if slot >= 0 {
            return None;
        }
        let index = i64::try_from(self.field_map.len()).ok()? + i64::from(slot);
        let index = usize::try_from(index).ok()?;
        self.field_map.get(index).copied()
    }

    /// Byte offset of field `field_no` found by walking the encoding
    /// sequentially from the array header. `None` when the tuple has
    /// fewer fields or is malformed.
    #[must_use]
    pub fn walk_to_field(&self, field_no: u32) -> Option<usize> {
        let (count, header) = decode_array_header(&self.data)?;
        if field_no >= count {
            return None;
        }
        let mut pos = header;
        for _ in 0..field_no {
            pos += next_element(self.data.get(pos..)?)?;
        }
        Some(pos)
    }

    /// The encoded element starting at byte `pos`.
    #[must_use]
    pub fn element_at(&self, pos: usize) -> Option<&[u8]> {
        let rest = self.data.get(pos..)?;
        let len = next_element(rest)?;
        Some(&rest[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FieldValue, encode_tuple};

    fn sample() -> Tuple {
        let data = encode_tuple(&[
            FieldValue::Integer(7),
            FieldValue::Str("abc".to_owned()),
            FieldValue::Integer(300),
        ]);
        Tuple::new(vec![], data)
    }

    #[test]
    fn field_count_from_header() {
        assert_eq!(sample().field_count(), Some(3));
    }

    #[test]
    fn sequential_walk_positions() {
        let tuple = sample();
        // header(1) + int7(1) + "abc"(4) → field offsets 1, 2, 6
        assert_eq!(tuple.walk_to_field(0), Some(1));
        assert_eq!(tuple.walk_to_field(1), Some(2));
        assert_eq!(tuple.walk_to_field(2), Some(6));
        assert_eq!(tuple.walk_to_field(3), None);
    }

    #[test]
    fn element_at_returns_whole_element() {
        let tuple = sample();
        let name = tuple.element_at(2).unwrap();
        assert_eq!(name, &[0xa3, b'a', b'b', b'c']);
    }

    #[test]
    fn negative_slot_addressing() {
        let tuple = Tuple::new(vec![10, 20, 30], vec![0x90]);
        assert_eq!(tuple.offset_at_slot(-1), Some(30));
        assert_eq!(tuple.offset_at_slot(-2), Some(20));
        assert_eq!(tuple.offset_at_slot(-3), Some(10));
        assert_eq!(tuple.offset_at_slot(-4), None);
        assert_eq!(tuple.offset_at_slot(0), None);
        assert_eq!(tuple.offset_at_slot(1), None);
    }

    #[test]
    fn handle_clone_counts_references() {
        let tuple: TupleRef = Rc::new(sample());
        let second = Rc::clone(&tuple);
        assert_eq!(Rc::strong_count(&tuple), 2);
        drop(second);
        assert_eq!(Rc::strong_count(&tuple), 1);
    }
}
