//! Tuple formats: per-space field layout with precomputed offset slots.
//!
//! A format merges a space's declared fields with the parts of all its
//! indexes into one effective per-field record, and decides which fields
//! need an explicit offset stored next to each tuple. Field 0 never gets
//! a slot (it sits just past the array header), and neither does any
//! part of a *sequential* key, whose fields are reached by a linear walk
//! from the tuple start. Every other indexed field past 0 is assigned a
//! negative slot in first-encounter order, counting down from −1; the
//! field map then occupies `|lowest slot| * 4` bytes ahead of each tuple
//! body.

use std::mem::size_of;
use std::rc::Rc;

use tbox_error::{EngineError, Result};
use tbox_types::wire::{decode_array_header, element_type, next_element};
use tbox_types::{ElementType, FieldDef, FieldType, KeyDef, NullAction, Tuple, TupleRef};

use crate::dict::TupleDictionary;
use crate::registry::FormatId;

/// User-facing field numbering starts at 1.
pub const INDEX_BASE: u32 = 1;

/// One field of a format: the merged view of the space definition and
/// every key part referencing the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleField {
    /// Effective field type.
    pub field_type: FieldType,
    /// Whether any index references this field.
    pub is_key_part: bool,
    /// Merged nullability action.
    pub nullable_action: NullAction,
    /// Assigned offset slot: `None`, or a unique negative integer.
    pub offset_slot: Option<i32>,
}

impl TupleField {
    const DEFAULT: Self = Self {
        field_type: FieldType::Any,
        is_key_part: false,
        nullable_action: NullAction::Default,
        offset_slot: None,
    };

    /// A field is nullable iff its merged action is `None`.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        matches!(self.nullable_action, NullAction::None)
    }
}

/// Operation table for tuple allocation, supplied by the collaborator
/// that owns tuple memory.
#[derive(Debug, Clone, Copy)]
pub struct TupleFormatVtab {
    /// Validate `data` against the format and produce a stored tuple.
    pub tuple_new: fn(&TupleFormat, &[u8]) -> Result<TupleRef>,
    /// Release a stored tuple.
    pub tuple_delete: fn(&TupleFormat, TupleRef),
}

impl TupleFormatVtab {
    /// The plain in-memory allocator: field map and bytes owned by the
    /// tuple itself, lifetime managed by the handle's reference count.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            tuple_new: in_memory_tuple_new,
            tuple_delete: in_memory_tuple_delete,
        }
    }
}

fn in_memory_tuple_new(format: &TupleFormat, data: &[u8]) -> Result<TupleRef> {
    let mut field_map = vec![0_u32; format.field_map_slots()];
    format.init_field_map(&mut field_map, data)?;
    Ok(Rc::new(Tuple::new(field_map, data.to_vec())))
}

fn in_memory_tuple_delete(_format: &TupleFormat, tuple: TupleRef) {
    drop(tuple);
}

/// Per-space tuple layout descriptor.
#[derive(Debug, Clone)]
pub struct TupleFormat {
    pub(crate) id: Option<FormatId>,
    pub(crate) refs: u32,
    vtab: TupleFormatVtab,
    dict: Rc<TupleDictionary>,
    fields: Vec<TupleField>,
    index_field_count: u32,
    exact_field_count: u32,
    min_field_count: u32,
    field_map_size: u16,
    extra_size: u16,
}

impl TupleFormat {
    /// Allocate an unregistered format skeleton: sizes the field table
    /// from the keys and the space field count, leaves every field at
    /// its default.
    pub(crate) fn alloc(
        keys: &[&KeyDef],
        space_field_count: u32,
        extra_size: u16,
        vtab: TupleFormatVtab,
        dict: Option<Rc<TupleDictionary>>,
    ) -> Result<Self> {
        let index_field_count = keys
            .iter()
            .map(|key| key.max_field_count())
            .max()
            .unwrap_or(0);
        let field_count = space_field_count.max(index_field_count) as usize;

        let mut fields = Vec::new();
        fields
            .try_reserve_exact(field_count)
            .map_err(|_| EngineError::oom(field_count * size_of::<TupleField>(), "tuple format"))?;
        fields.resize(field_count, TupleField::DEFAULT);

        let dict = match dict {
            Some(dict) => dict,
            None => {
                debug_assert_eq!(space_field_count, 0);
                TupleDictionary::empty()
            }
        };
        debug_assert!(dict.field_count() == space_field_count || space_field_count == 0);

        Ok(Self {
            id: None,
            refs: 0,
            vtab,
            dict,
            fields,
            index_field_count,
            exact_field_count: 0,
            min_field_count: index_field_count,
            field_map_size: 0,
            extra_size,
        })
    }

    /// Fill in the field table from keys and space field definitions and
    /// lay out the offset slots. Fails without installing partial layout
    /// observable to callers; the registry rolls back registration on
    /// error.
    pub(crate) fn create(&mut self, keys: &[&KeyDef], space_fields: &[FieldDef]) -> Result<()> {
        if self.fields.is_empty() {
            self.field_map_size = 0;
            return Ok(());
        }

        for (no, def) in space_fields.iter().enumerate() {
            let field = &mut self.fields[no];
            field.field_type = def.field_type;
            field.is_key_part = false;
            field.offset_slot = None;
            field.nullable_action = def.nullable_action;
            let required = no as u32 + 1;
            if required > self.min_field_count && !def.is_nullable {
                self.min_field_count = required;
            }
        }

        let mut cur_slot: i32 = 0;

        for key in keys {
            let is_sequential = key.is_sequential();
            for part in &key.parts {
                debug_assert!((part.field_no as usize) < self.fields.len());
                let field_no = part.field_no as usize;
                let field = &mut self.fields[field_no];

                if field_no >= space_fields.len() {
                    field.nullable_action = part.nullable_action;
                } else {
                    if field.is_nullable() != part.is_nullable {
                        return Err(EngineError::NullableMismatch {
                            field_index: part.field_no + INDEX_BASE,
                            format: nullability_str(field.is_nullable()),
                            part: nullability_str(part.is_nullable),
                        });
                    }
                    if field.nullable_action == NullAction::Default
                        && !matches!(
                            part.nullable_action,
                            NullAction::None | NullAction::Default
                        )
                    {
                        field.nullable_action = part.nullable_action;
                    } else if field.nullable_action != part.nullable_action
                        && part.nullable_action != NullAction::Default
                    {
                        return Err(EngineError::ActionMismatch {
                            field_index: part.field_no + INDEX_BASE,
                            format_action: field.nullable_action.as_str(),
                            part_action: part.nullable_action.as_str(),
                        });
                    }
                }

                if field.field_type == FieldType::Any {
                    field.field_type = part.field_type;
                } else if field.field_type != part.field_type {
                    let name = if field_no < space_fields.len() {
                        format!("'{}'", space_fields[field_no].name)
                    } else {
                        (part.field_no + INDEX_BASE).to_string()
                    };
                    let format_type = field.field_type.as_str();
                    let part_type = part.field_type.as_str();
                    return Err(if field.is_key_part {
                        EngineError::IndexPartTypeMismatch {
                            field: name,
                            format_type,
                            part_type,
                        }
                    } else {
                        EngineError::FormatMismatchIndexPart {
                            field: name,
                            format_type,
                            part_type,
                        }
                    });
                }
                field.is_key_part = true;

                // Only non-sequential keys need stored offsets, and the
                // first field is reachable without one.
                if field.offset_slot.is_none() && !is_sequential && part.field_no > 0 {
                    cur_slot -= 1;
                    field.offset_slot = Some(cur_slot);
                }
            }
        }

        debug_assert!(self.fields[0].offset_slot.is_none());
        let slots = cur_slot.unsigned_abs();
        let map_size = slots * 4;
        if map_size + u32::from(self.extra_size) > u32::from(u16::MAX) {
            return Err(EngineError::IndexFieldCountLimit { slots });
        }
        self.field_map_size = map_size as u16;
        Ok(())
    }

    /// Registry slot, when registered.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<FormatId> {
        self.id
    }

    /// Current external reference count.
    #[inline]
    #[must_use]
    pub fn refs(&self) -> u32 {
        self.refs
    }

    /// Total fields tracked by this format.
    #[inline]
    #[must_use]
    pub fn field_count(&self) -> u32 {
        self.fields.len() as u32
    }

    /// `1 + max field number` referenced by any key; 0 without keys.
    #[inline]
    #[must_use]
    pub fn index_field_count(&self) -> u32 {
        self.index_field_count
    }

    /// When non-zero, tuples must carry exactly this many fields.
    #[inline]
    #[must_use]
    pub fn exact_field_count(&self) -> u32 {
        self.exact_field_count
    }

    /// Require tuples to carry exactly `count` fields (0 disables).
    pub fn set_exact_field_count(&mut self, count: u32) {
        self.exact_field_count = count;
    }

    /// Smallest admissible tuple field count.
    #[inline]
    #[must_use]
    pub fn min_field_count(&self) -> u32 {
        self.min_field_count
    }

    /// Field-map prefix size in bytes.
    #[inline]
    #[must_use]
    pub fn field_map_size(&self) -> u16 {
        self.field_map_size
    }

    /// Field-map prefix size in `u32` slots.
    #[inline]
    #[must_use]
    pub fn field_map_slots(&self) -> usize {
        usize::from(self.field_map_size) / 4
    }

    /// Caller-reserved per-tuple bytes.
    #[inline]
    #[must_use]
    pub fn extra_size(&self) -> u16 {
        self.extra_size
    }

    /// The merged field records.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[TupleField] {
        &self.fields
    }

    /// One field record.
    #[must_use]
    pub fn field(&self, field_no: u32) -> Option<&TupleField> {
        self.fields.get(field_no as usize)
    }

    /// The shared field-name dictionary.
    #[must_use]
    pub fn dict(&self) -> &Rc<TupleDictionary> {
        &self.dict
    }

    /// Structural layout equality: map size, field count, and per-field
    /// type, slot, key-part flag, and nullability. The dictionary and
    /// the vtab are not part of the layout.
    #[must_use]
    pub fn layout_eq(&self, other: &Self) -> bool {
        if self.field_map_size != other.field_map_size || self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields.iter().zip(&other.fields).all(|(a, b)| {
            a.field_type == b.field_type
                && a.offset_slot == b.offset_slot
                && a.is_key_part == b.is_key_part
                && a.is_nullable() == b.is_nullable()
        })
    }

    /// Validate an encoded tuple against this format and fill in its
    /// field map.
    ///
    /// `field_map` must hold exactly [`field_map_slots`] entries; on
    /// success every entry backing an assigned slot holds the byte
    /// offset of its field, relative to the start of `tuple`. Fields
    /// beyond [`field_count`] are not validated.
    ///
    /// [`field_map_slots`]: Self::field_map_slots
    /// [`field_count`]: Self::field_count
    pub fn init_field_map(&self, field_map: &mut [u32], tuple: &[u8]) -> Result<()> {
        debug_assert_eq!(field_map.len(), self.field_map_slots());

        let Some((field_count, header_len)) = decode_array_header(tuple) else {
            return Err(EngineError::InvalidTuple {
                detail: "expected a top-level array",
            });
        };
        if self.exact_field_count > 0 && field_count != self.exact_field_count {
            return Err(EngineError::ExactFieldCount {
                expected: self.exact_field_count,
                actual: field_count,
            });
        }
        if field_count < self.min_field_count {
            return Err(EngineError::MinFieldCount {
                expected: self.min_field_count,
                actual: field_count,
            });
        }

        let defined = field_count.min(self.field_count());
        let mut pos = header_len;
        for no in 0..defined {
            let rest = tuple.get(pos..).unwrap_or(&[]);
            let Some(&tag) = rest.first() else {
                return Err(EngineError::InvalidTuple {
                    detail: "tuple body shorter than its header claims",
                });
            };
            let Some(element) = element_type(tag) else {
                return Err(EngineError::InvalidTuple {
                    detail: "reserved element tag",
                });
            };
            let field = &self.fields[no as usize];
            if !field_admits(field, element) {
                return Err(EngineError::FieldType {
                    field_index: no + INDEX_BASE,
                    expected: field.field_type.as_str(),
                    actual: element.as_str(),
                });
            }
            if no > 0 {
                if let Some(slot) = field.offset_slot {
                    let index = field_map.len() as i64 + i64::from(slot);
                    let offset = u32::try_from(pos).map_err(|_| EngineError::InvalidTuple {
                        detail: "tuple exceeds addressable size",
                    })?;
                    field_map[usize::try_from(index).expect("slot within map")] = offset;
                }
            }
            pos += next_element(rest).ok_or(EngineError::InvalidTuple {
                detail: "truncated element",
            })?;
        }
        Ok(())
    }

    /// Build a stored tuple from encoded bytes through the vtab.
    pub fn new_tuple(&self, data: &[u8]) -> Result<TupleRef> {
        (self.vtab.tuple_new)(self, data)
    }

    /// Release a stored tuple through the vtab.
    pub fn delete_tuple(&self, tuple: TupleRef) {
        (self.vtab.tuple_delete)(self, tuple);
    }

    /// Random access to one field of a stored tuple.
    ///
    /// Field 0 sits just past the array header; a field with an assigned
    /// slot reads its offset from the tuple's field map; any other field
    /// is found by a sequential walk. Returns the whole encoded element,
    /// or `None` when the tuple has no such field.
    #[must_use]
    pub fn tuple_field<'t>(&self, tuple: &'t Tuple, field_no: u32) -> Option<&'t [u8]> {
        if field_no >= tuple.field_count()? {
            return None;
        }
        if field_no == 0 {
            let (_, header_len) = decode_array_header(tuple.data())?;
            return tuple.element_at(header_len);
        }
        if let Some(slot) = self.field(field_no).and_then(|field| field.offset_slot) {
            let offset = tuple.offset_at_slot(slot)?;
            return tuple.element_at(offset as usize);
        }
        tuple.element_at(tuple.walk_to_field(field_no)?)
    }
}

fn field_admits(field: &TupleField, element: ElementType) -> bool {
    if field.is_nullable() && element == ElementType::Nil {
        return true;
    }
    field.field_type.admits(element)
}

const fn nullability_str(is_nullable: bool) -> &'static str {
    if is_nullable { "nullable" } else { "not nullable" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbox_error::ErrorKind;
    use tbox_types::{FieldValue, IndexId, IndexKind, KeyPart, SpaceId, encode_tuple};

    fn key(kind: IndexKind, unique: bool, parts: &[KeyPart]) -> KeyDef {
        KeyDef::new(
            IndexId::new(0),
            SpaceId::new(512),
            kind,
            unique,
            parts.iter().copied(),
        )
    }

    fn format_for(keys: &[&KeyDef], space_fields: &[FieldDef]) -> Result<TupleFormat> {
        let dict = if space_fields.is_empty() {
            None
        } else {
            Some(TupleDictionary::from_defs(space_fields))
        };
        let mut format = TupleFormat::alloc(
            keys,
            space_fields.len() as u32,
            0,
            TupleFormatVtab::in_memory(),
            dict,
        )?;
        format.create(keys, space_fields)?;
        Ok(format)
    }

    #[test]
    fn empty_format() {
        let format = format_for(&[], &[]).unwrap();
        assert_eq!(format.field_count(), 0);
        assert_eq!(format.index_field_count(), 0);
        assert_eq!(format.min_field_count(), 0);
        assert_eq!(format.field_map_size(), 0);
    }

    #[test]
    fn sequential_primary_key_needs_no_map() {
        let space_fields = [
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::String),
        ];
        let pk = key(IndexKind::Hash, true, &[KeyPart::new(0, FieldType::Integer)]);
        let format = format_for(&[&pk], &space_fields).unwrap();

        assert_eq!(format.field_count(), 2);
        assert_eq!(format.index_field_count(), 1);
        assert_eq!(format.min_field_count(), 2);
        assert_eq!(format.field_map_size(), 0);
        assert!(format.fields().iter().all(|f| f.offset_slot.is_none()));
        assert!(format.field(0).unwrap().is_key_part);
        assert!(!format.field(1).unwrap().is_key_part);
    }

    #[test]
    fn non_sequential_key_gets_slot() {
        let space_fields = [
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("b", FieldType::String),
            FieldDef::new("c", FieldType::String),
        ];
        let secondary = key(IndexKind::Tree, true, &[KeyPart::new(2, FieldType::String)]);
        let format = format_for(&[&secondary], &space_fields).unwrap();

        assert_eq!(format.field(0).unwrap().offset_slot, None);
        assert_eq!(format.field(1).unwrap().offset_slot, None);
        assert_eq!(format.field(2).unwrap().offset_slot, Some(-1));
        assert_eq!(format.field_map_size(), 4);
    }

    #[test]
    fn slots_assigned_in_first_encounter_order() {
        let space_fields = [
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("b", FieldType::String),
            FieldDef::new("c", FieldType::String),
            FieldDef::new("d", FieldType::Integer),
        ];
        let first = key(IndexKind::Tree, true, &[KeyPart::new(3, FieldType::Integer)]);
        let second = key(
            IndexKind::Tree,
            false,
            &[
                KeyPart::new(1, FieldType::String),
                KeyPart::new(3, FieldType::Integer),
            ],
        );
        let format = format_for(&[&first, &second], &space_fields).unwrap();

        assert_eq!(format.field(3).unwrap().offset_slot, Some(-1));
        assert_eq!(format.field(1).unwrap().offset_slot, Some(-2));
        assert_eq!(format.field(2).unwrap().offset_slot, None);
        assert_eq!(format.field_map_size(), 8);
    }

    #[test]
    fn key_presentation_order_shapes_layout() {
        // The same field keeps no slot when first seen through a
        // sequential key, even if a later non-sequential key also
        // references it.
        let space_fields = [
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("b", FieldType::String),
        ];
        let sequential = key(
            IndexKind::Tree,
            true,
            &[
                KeyPart::new(0, FieldType::Integer),
                KeyPart::new(1, FieldType::String),
            ],
        );
        let scattered = key(IndexKind::Tree, false, &[KeyPart::new(1, FieldType::String)]);

        let seq_first = format_for(&[&sequential, &scattered], &space_fields).unwrap();
        assert_eq!(seq_first.field(1).unwrap().offset_slot, Some(-1));

        // Presented the other way round, the scattered key claims the
        // slot before the sequential key is ever seen; the layout is the
        // same but for the opposite reason, and with reversed first-seen
        // order it would differ as soon as more fields join.
        let scattered_first = format_for(&[&scattered, &sequential], &space_fields).unwrap();
        assert_eq!(scattered_first.field(1).unwrap().offset_slot, Some(-1));
    }

    #[test]
    fn key_beyond_space_fields_extends_format() {
        let space_fields = [FieldDef::new("id", FieldType::Integer)];
        let wide = key(IndexKind::Tree, true, &[KeyPart::new(4, FieldType::String)]);
        let format = format_for(&[&wide], &space_fields).unwrap();

        assert_eq!(format.field_count(), 5);
        assert_eq!(format.index_field_count(), 5);
        assert_eq!(format.min_field_count(), 5);
        assert_eq!(format.field(4).unwrap().field_type, FieldType::String);
        assert_eq!(format.field(2).unwrap().field_type, FieldType::Any);
    }

    #[test]
    fn any_field_takes_part_type() {
        let pk = key(IndexKind::Tree, true, &[KeyPart::new(1, FieldType::String)]);
        let format = format_for(&[&pk], &[]).unwrap();
        assert_eq!(format.field(1).unwrap().field_type, FieldType::String);
        assert_eq!(format.field(0).unwrap().field_type, FieldType::Any);
    }

    #[test]
    fn space_type_conflict_with_part() {
        let space_fields = [FieldDef::new("id", FieldType::Integer)];
        let bad = key(IndexKind::Tree, true, &[KeyPart::new(0, FieldType::String)]);
        let err = format_for(&[&bad], &space_fields).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatMismatchIndexPart);
        assert!(err.to_string().contains("'id'"), "cites the field name");
    }

    #[test]
    fn part_type_conflict_between_indexes() {
        let first = key(IndexKind::Tree, true, &[KeyPart::new(1, FieldType::String)]);
        let second = key(IndexKind::Tree, false, &[KeyPart::new(1, FieldType::Integer)]);
        let err = format_for(&[&first, &second], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexPartTypeMismatch);
        assert!(err.to_string().contains('2'), "cites the 1-based number");
    }

    #[test]
    fn nullable_mismatch_detected() {
        let space_fields = [
            FieldDef::new("id", FieldType::Integer),
            FieldDef::nullable("note", FieldType::String),
        ];
        let strict = key(IndexKind::Tree, true, &[KeyPart::new(1, FieldType::String)]);
        let err = format_for(&[&strict], &space_fields).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NullableMismatch);
        assert_eq!(err.field_index(), Some(2));
    }

    #[test]
    fn action_mismatch_detected() {
        let mut abort_def = FieldDef::new("id", FieldType::Integer);
        abort_def.nullable_action = NullAction::Abort;
        let mut fail_part = KeyPart::new(0, FieldType::Integer);
        fail_part.nullable_action = NullAction::Fail;
        let bad = key(IndexKind::Tree, true, &[fail_part]);
        let err = format_for(&[&bad], &[abort_def]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionMismatch);
    }

    #[test]
    fn default_action_takes_part_action() {
        let space_fields = [FieldDef::new("id", FieldType::Integer)];
        let mut part = KeyPart::new(0, FieldType::Integer);
        part.nullable_action = NullAction::Abort;
        let pk = key(IndexKind::Tree, true, &[part]);
        let format = format_for(&[&pk], &space_fields).unwrap();
        assert_eq!(format.field(0).unwrap().nullable_action, NullAction::Abort);
    }

    #[test]
    fn layout_equality_ignores_dictionary() {
        let fields_a = [
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::String),
        ];
        let fields_b = [
            FieldDef::new("key", FieldType::Integer),
            FieldDef::new("value", FieldType::String),
        ];
        let pk = key(IndexKind::Tree, true, &[KeyPart::new(0, FieldType::Integer)]);
        let a = format_for(&[&pk], &fields_a).unwrap();
        let b = format_for(&[&pk], &fields_b).unwrap();
        assert!(a.layout_eq(&b));

        let c = format_for(&[], &fields_a).unwrap();
        assert!(!a.layout_eq(&c));
    }

    // -- init_field_map ----------------------------------------------------

    fn two_field_format() -> TupleFormat {
        let space_fields = [
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("name", FieldType::String),
        ];
        let pk = key(IndexKind::Hash, true, &[KeyPart::new(0, FieldType::Integer)]);
        format_for(&[&pk], &space_fields).unwrap()
    }

    #[test]
    fn validates_good_tuple() {
        let format = two_field_format();
        let data = encode_tuple(&[
            FieldValue::Integer(1),
            FieldValue::Str("alice".to_owned()),
        ]);
        let mut map = vec![0_u32; format.field_map_slots()];
        format.init_field_map(&mut map, &data).unwrap();
    }

    #[test]
    fn rejects_type_mismatch_with_one_based_index() {
        let format = two_field_format();
        let data = encode_tuple(&[FieldValue::Integer(1), FieldValue::Integer(2)]);
        let mut map = vec![0_u32; format.field_map_slots()];
        let err = format.init_field_map(&mut map, &data).unwrap_err();
        assert_eq!(
            err,
            EngineError::FieldType {
                field_index: 2,
                expected: "string",
                actual: "integer",
            }
        );
    }

    #[test]
    fn rejects_short_tuple() {
        let format = two_field_format();
        let data = encode_tuple(&[FieldValue::Integer(1)]);
        let mut map = vec![0_u32; format.field_map_slots()];
        let err = format.init_field_map(&mut map, &data).unwrap_err();
        assert_eq!(
            err,
            EngineError::MinFieldCount {
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn exact_field_count_enforced() {
        let mut format = two_field_format();
        format.set_exact_field_count(2);
        let data = encode_tuple(&[
            FieldValue::Integer(1),
            FieldValue::Str("a".to_owned()),
            FieldValue::Integer(9),
        ]);
        let mut map = vec![0_u32; format.field_map_slots()];
        let err = format.init_field_map(&mut map, &data).unwrap_err();
        assert_eq!(
            err,
            EngineError::ExactFieldCount {
                expected: 2,
                actual: 3,
            }
        );
    }

    #[test]
    fn exact_field_count_applies_without_fields() {
        let mut format = format_for(&[], &[]).unwrap();
        format.set_exact_field_count(1);
        let ok = encode_tuple(&[FieldValue::Integer(1)]);
        let bad = encode_tuple(&[]);
        format.init_field_map(&mut [], &ok).unwrap();
        let err = format.init_field_map(&mut [], &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExactFieldCount);
    }

    #[test]
    fn zero_field_format_accepts_any_array() {
        let format = format_for(&[], &[]).unwrap();
        let data = encode_tuple(&[FieldValue::Bool(true), FieldValue::Nil]);
        format.init_field_map(&mut [], &data).unwrap();
    }

    #[test]
    fn nullable_field_accepts_nil() {
        let space_fields = [
            FieldDef::new("id", FieldType::Integer),
            FieldDef::nullable("note", FieldType::String),
        ];
        let pk = key(IndexKind::Hash, true, &[KeyPart::new(0, FieldType::Integer)]);
        let format = format_for(&[&pk], &space_fields).unwrap();
        let data = encode_tuple(&[FieldValue::Integer(1), FieldValue::Nil]);
        let mut map = vec![0_u32; format.field_map_slots()];
        format.init_field_map(&mut map, &data).unwrap();
    }

    #[test]
    fn fields_beyond_format_are_not_validated() {
        let format = two_field_format();
        let data = encode_tuple(&[
            FieldValue::Integer(1),
            FieldValue::Str("a".to_owned()),
            FieldValue::Bool(false),
            FieldValue::Array(vec![]),
        ]);
        let mut map = vec![0_u32; format.field_map_slots()];
        format.init_field_map(&mut map, &data).unwrap();
    }

    #[test]
    fn rejects_non_array_and_truncation() {
        let format = format_for(&[], &[]).unwrap();
        let err = format.init_field_map(&mut [], &[0xc0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTuple);

        let format = two_field_format();
        let mut data = encode_tuple(&[FieldValue::Integer(1), FieldValue::Str("abc".to_owned())]);
        data.truncate(data.len() - 1);
        let mut map = vec![0_u32; format.field_map_slots()];
        let err = format.init_field_map(&mut map, &data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTuple);
    }

    #[test]
    fn offsets_match_sequential_walk() {
        let space_fields = [
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("b", FieldType::String),
            FieldDef::new("c", FieldType::String),
            FieldDef::new("d", FieldType::Integer),
        ];
        let pk = key(IndexKind::Hash, true, &[KeyPart::new(0, FieldType::Integer)]);
        let by_c = key(IndexKind::Tree, false, &[KeyPart::new(2, FieldType::String)]);
        let by_d = key(IndexKind::Tree, false, &[KeyPart::new(3, FieldType::Integer)]);
        let format = format_for(&[&pk, &by_c, &by_d], &space_fields).unwrap();
        assert_eq!(format.field_map_slots(), 2);

        let data = encode_tuple(&[
            FieldValue::Integer(10),
            FieldValue::Str("bb".to_owned()),
            FieldValue::Str("cc".to_owned()),
            FieldValue::Integer(99),
        ]);
        let mut map = vec![0_u32; format.field_map_slots()];
        format.init_field_map(&mut map, &data).unwrap();

        let tuple = Tuple::new(map, data);
        for field_no in 2..=3 {
            let slot = format.field(field_no).unwrap().offset_slot.unwrap();
            let mapped = tuple.offset_at_slot(slot).unwrap() as usize;
            let walked = tuple.walk_to_field(field_no).unwrap();
            assert_eq!(mapped, walked, "field {field_no}");
        }
    }

    #[test]
    fn tuple_field_random_access() {
        let space_fields = [
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("b", FieldType::String),
            FieldDef::new("c", FieldType::String),
        ];
        let pk = key(IndexKind::Hash, true, &[KeyPart::new(0, FieldType::Integer)]);
        let by_c = key(IndexKind::Tree, false, &[KeyPart::new(2, FieldType::String)]);
        let format = format_for(&[&pk, &by_c], &space_fields).unwrap();

        let tuple = format
            .new_tuple(&encode_tuple(&[
                FieldValue::Integer(7),
                FieldValue::Str("b".to_owned()),
                FieldValue::Str("c".to_owned()),
            ]))
            .unwrap();

        assert_eq!(format.tuple_field(&tuple, 0), Some(&[0x07][..]));
        assert_eq!(format.tuple_field(&tuple, 1), Some(&[0xa1, b'b'][..]));
        assert_eq!(format.tuple_field(&tuple, 2), Some(&[0xa1, b'c'][..]));
        assert_eq!(format.tuple_field(&tuple, 3), None);
    }

    #[test]
    fn map_size_limit_enforced() {
        // extra_size pushes the combined prefix past what the tuple
        // header can address with a single assigned slot.
        let space_fields = [
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("b", FieldType::String),
        ];
        let by_b = key(IndexKind::Tree, false, &[KeyPart::new(1, FieldType::String)]);
        let dict = TupleDictionary::from_defs(&space_fields);
        let mut format = TupleFormat::alloc(
            &[&by_b],
            2,
            u16::MAX - 3,
            TupleFormatVtab::in_memory(),
            Some(dict),
        )
        .unwrap();
        let err = format.create(&[&by_b], &space_fields).unwrap_err();
        assert_eq!(err, EngineError::IndexFieldCountLimit { slots: 1 });
    }
}
