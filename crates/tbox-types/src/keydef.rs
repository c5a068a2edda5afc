//! Index key definitions: parts, kinds, and the sequential-key predicate.

use std::fmt;

use smallvec::SmallVec;

use crate::field::{FieldType, NullAction};

/// Stable numeric identifier of a space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct SpaceId(u32);

impl SpaceId {
    /// Construct from a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable numeric identifier of an index within its space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct IndexId(u32);

impl IndexId {
    /// Construct from a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported index variants. The table is closed; adding a kind means
/// touching every exhaustive match in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Unordered unique point-lookup index.
    Hash,
    /// Ordered index; point, range, and iteration.
    Tree,
    /// Spatial index over array-encoded coordinates.
    Rtree,
    /// Bitmap index over scalar values.
    Bitset,
}

impl IndexKind {
    /// Uppercase name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "HASH",
            Self::Tree => "TREE",
            Self::Rtree => "RTREE",
            Self::Bitset => "BITSET",
        }
    }

    /// Decode a kind from its wire discriminant, the seam where hosts
    /// hand over untrusted metadata.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Hash),
            1 => Some(Self::Tree),
            2 => Some(Self::Rtree),
            3 => Some(Self::Bitset),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component of a compound key: field number, type, nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyPart {
    /// 0-based field number the part references.
    pub field_no: u32,
    /// Required field type.
    pub field_type: FieldType,
    /// Whether nil is admissible in this part.
    pub is_nullable: bool,
    /// Action on missing or nil values.
    pub nullable_action: NullAction,
}

impl KeyPart {
    /// A non-nullable part with an unset action.
    #[must_use]
    pub const fn new(field_no: u32, field_type: FieldType) -> Self {
        Self {
            field_no,
            field_type,
            is_nullable: false,
            nullable_action: NullAction::Default,
        }
    }

    /// A nullable part.
    #[must_use]
    pub const fn nullable(field_no: u32, field_type: FieldType) -> Self {
        Self {
            field_no,
            field_type,
            is_nullable: true,
            nullable_action: NullAction::None,
        }
    }
}

/// An ordered key definition for one index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyDef {
    /// Index identifier within the owning space.
    pub index_id: IndexId,
    /// Owning space identifier.
    pub space_id: SpaceId,
    /// Index variant.
    pub kind: IndexKind,
    /// Whether the key is unique.
    pub is_unique: bool,
    /// Ordered key parts. Compound keys are short in practice.
    pub parts: SmallVec<[KeyPart; 4]>,
}

impl KeyDef {
    /// Build a key definition from parts.
    #[must_use]
    pub fn new(
        index_id: IndexId,
        space_id: SpaceId,
        kind: IndexKind,
        is_unique: bool,
        parts: impl IntoIterator<Item = KeyPart>,
    ) -> Self {
        Self {
            index_id,
            space_id,
            kind,
            is_unique,
            parts: parts.into_iter().collect(),
        }
    }

    /// Number of parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Whether part `i` references field `i` for every part, i.e. the key
    /// covers a contiguous ascending prefix of the tuple starting at
    /// field 0. Such keys are walked linearly from the tuple start at
    /// index time and need no stored offsets.
    #[must_use]
    pub fn is_sequential(&self) -> bool {
        self.parts
            .iter()
            .enumerate()
            .all(|(i, part)| part.field_no as usize == i)
    }

    /// Highest referenced field number plus one; 0 for an empty key.
    #[must_use]
    pub fn max_field_count(&self) -> u32 {
        self.parts
            .iter()
            .map(|part| part.field_no + 1)
            .max()
            .unwrap_or(0)
    }
}
