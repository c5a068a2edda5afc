//! Tuple format registry for TupleBox.
//!
//! A *format* is the per-space layout descriptor: the merged view of the
//! space's declared fields and every index key part, plus the layout of
//! the field-offset map prepended to each stored tuple. The *registry*
//! assigns formats small stable ids and recycles them through an
//! intrusive free list kept inside the directory itself.

pub mod dict;
pub mod format;
pub mod registry;

pub use dict::TupleDictionary;
pub use format::{INDEX_BASE, TupleField, TupleFormat, TupleFormatVtab};
pub use registry::{FORMAT_ID_MAX, FormatId, FormatRegistry};
