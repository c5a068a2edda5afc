//! Error types for TupleBox.
//!
//! Every failure in the engine core is final: nothing here is retried,
//! and no partial state survives a constructor that returns `Err`. The
//! host consumes errors through three views: the [`Display`] message,
//! the closed [`ErrorKind`] discriminant, and — for validation failures
//! that concern one field — the 1-based [`field_index`].
//!
//! [`Display`]: std::fmt::Display
//! [`field_index`]: EngineError::field_index

use thiserror::Error;

/// Primary error type for engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An allocation failed. Carries the attempted size and a stable
    /// string identifying the allocation site.
    #[error("failed to allocate {requested} bytes for {site}")]
    OutOfMemory {
        requested: usize,
        site: &'static str,
    },

    /// The format directory is full: every admissible id is in use.
    #[error("tuple format limit reached: {capacity} formats registered")]
    TupleFormatLimit { capacity: u32 },

    /// Unsupported index kind.
    #[error("unsupported index type for index {index_id} in space {space_id}")]
    IndexType { index_id: u32, space_id: u32 },

    /// An index definition violates a per-kind constraint.
    #[error("can't create or modify index {index_id} in space {space_id}: {detail}")]
    ModifyIndex {
        index_id: u32,
        space_id: u32,
        detail: &'static str,
    },

    /// An index part's type contradicts the space's field definition for
    /// a field not referenced by any earlier index.
    #[error("field {field} has type '{format_type}' in space format, but type '{part_type}' in index definition")]
    FormatMismatchIndexPart {
        field: String,
        format_type: &'static str,
        part_type: &'static str,
    },

    /// Two index parts referencing the same field disagree on its type.
    #[error("field {field} has type '{format_type}' in one index, but type '{part_type}' in another")]
    IndexPartTypeMismatch {
        field: String,
        format_type: &'static str,
        part_type: &'static str,
    },

    /// A field's nullability differs between the space definition and an
    /// index part referencing it.
    #[error("field {field_index} is {format} in space format, but {part} in index definition")]
    NullableMismatch {
        field_index: u32,
        format: &'static str,
        part: &'static str,
    },

    /// Two definitions of the same field carry incompatible nullability
    /// actions.
    #[error("field {field_index} has conflicting nullability actions: '{format_action}' vs '{part_action}'")]
    ActionMismatch {
        field_index: u32,
        format_action: &'static str,
        part_action: &'static str,
    },

    /// The field map grew past what the tuple header can address.
    #[error("too many indexed fields: {slots} offset slots do not fit the tuple header")]
    IndexFieldCountLimit { slots: u32 },

    /// The tuple's field count differs from the format's exact count.
    #[error("tuple field count {actual} does not match space field count {expected}")]
    ExactFieldCount { expected: u32, actual: u32 },

    /// The tuple has fewer fields than the format requires.
    #[error("tuple field count {actual} is less than required by space format or defined indexes ({expected})")]
    MinFieldCount { expected: u32, actual: u32 },

    /// A field's encoded type contradicts the format. The index is
    /// 1-based, matching user-facing numbering.
    #[error("tuple field {field_index} type does not match one required by operation: expected {expected}, got {actual}")]
    FieldType {
        field_index: u32,
        expected: &'static str,
        actual: &'static str,
    },

    /// The encoded tuple itself is malformed: truncated, bearing a
    /// reserved tag, or not an array at the top level.
    #[error("invalid tuple: {detail}")]
    InvalidTuple { detail: &'static str },

    /// Internal invariant violation. Reaching this is a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Closed discriminant for [`EngineError`], the engine's diagnostic
/// channel towards hosts that dispatch on kind rather than message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OutOfMemory,
    TupleFormatLimit,
    IndexType,
    ModifyIndex,
    FormatMismatchIndexPart,
    IndexPartTypeMismatch,
    NullableMismatch,
    ActionMismatch,
    IndexFieldCountLimit,
    ExactFieldCount,
    MinFieldCount,
    FieldType,
    InvalidTuple,
    Internal,
}

impl EngineError {
    /// Map this error to its kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::TupleFormatLimit { .. } => ErrorKind::TupleFormatLimit,
            Self::IndexType { .. } => ErrorKind::IndexType,
            Self::ModifyIndex { .. } => ErrorKind::ModifyIndex,
            Self::FormatMismatchIndexPart { .. } => ErrorKind::FormatMismatchIndexPart,
            Self::IndexPartTypeMismatch { .. } => ErrorKind::IndexPartTypeMismatch,
            Self::NullableMismatch { .. } => ErrorKind::NullableMismatch,
            Self::ActionMismatch { .. } => ErrorKind::ActionMismatch,
            Self::IndexFieldCountLimit { .. } => ErrorKind::IndexFieldCountLimit,
            Self::ExactFieldCount { .. } => ErrorKind::ExactFieldCount,
            Self::MinFieldCount { .. } => ErrorKind::MinFieldCount,
            Self::FieldType { .. } => ErrorKind::FieldType,
            Self::InvalidTuple { .. } => ErrorKind::InvalidTuple,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The 1-based field index this error concerns, when it concerns one.
    #[must_use]
    pub const fn field_index(&self) -> Option<u32> {
        match self {
            Self::NullableMismatch { field_index, .. }
            | Self::ActionMismatch { field_index, .. }
            | Self::FieldType { field_index, .. } => Some(*field_index),
            _ => None,
        }
    }

    /// Whether this error arose from validating a tuple at insert time,
    /// as opposed to constructing a format or an index.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ExactFieldCount { .. }
                | Self::MinFieldCount { .. }
                | Self::FieldType { .. }
                | Self::InvalidTuple { .. }
        )
    }

    /// Create an out-of-memory error for an allocation site.
    #[must_use]
    pub const fn oom(requested: usize, site: &'static str) -> Self {
        Self::OutOfMemory { requested, site }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
