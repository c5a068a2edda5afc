//! Core types for the TupleBox in-memory tuple storage engine.
//!
//! This crate holds everything the format registry and the engine agree
//! on: the tuple wire codec, field types and nullability actions, key
//! definitions, and the stored-tuple container. It has no knowledge of
//! formats, registries, or indexes.

pub mod field;
pub mod keydef;
pub mod tuple;
pub mod value;
pub mod wire;

pub use field::{FieldDef, FieldType, NullAction};
pub use keydef::{IndexId, IndexKind, KeyDef, KeyPart, SpaceId};
pub use tuple::{Tuple, TupleRef};
pub use value::{FieldValue, decode_tuple, encode_tuple};
pub use wire::{ElementType, decode_array_header, element_type, next_element};
