//! Index variants, the factory, and key-definition validation.
//!
//! The engine supports a closed table of index variants. Each variant
//! implements the same capability set — positional iteration, insert,
//! remove, count — over the common insertion-ordered tuple store; the
//! variant-specific lookup structures live in external collaborators
//! and are not part of this core. What the core does own is one tuple
//! reference per contained tuple, released exactly once on drop.

use std::rc::Rc;

use tracing::debug;

use tbox_error::{EngineError, Result};
use tbox_types::{FieldType, IndexId, IndexKind, KeyDef, SpaceId, TupleRef};

// ---------------------------------------------------------------------------
// Common tuple store
// ---------------------------------------------------------------------------

/// Insertion-ordered tuple store backing every variant.
///
/// Holding a tuple here holds one reference to it; removal hands the
/// reference back to the caller.
#[derive(Debug, Default)]
pub struct IndexStore {
    entries: Vec<TupleRef>,
}

impl IndexStore {
    fn insert(&mut self, tuple: TupleRef) {
        self.entries.push(tuple);
    }

    fn remove(&mut self, tuple: &TupleRef) -> Option<TupleRef> {
        let at = self.entries.iter().position(|t| Rc::ptr_eq(t, tuple))?;
        Some(self.entries.remove(at))
    }

    fn contains(&self, tuple: &TupleRef) -> bool {
        self.entries.iter().any(|t| Rc::ptr_eq(t, tuple))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> std::slice::Iter<'_, TupleRef> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Unordered unique point-lookup index.
#[derive(Debug)]
pub struct HashIndex {
    key_def: KeyDef,
    store: IndexStore,
}

/// Ordered index supporting point, range, and full iteration.
#[derive(Debug)]
pub struct TreeIndex {
    key_def: KeyDef,
    store: IndexStore,
}

/// Spatial index over array-encoded coordinates.
#[derive(Debug)]
pub struct RtreeIndex {
    key_def: KeyDef,
    store: IndexStore,
}

/// Bitmap index over scalar values.
#[derive(Debug)]
pub struct BitsetIndex {
    key_def: KeyDef,
    store: IndexStore,
}

impl HashIndex {
    fn new(key_def: KeyDef) -> Self {
        Self {
            key_def,
            store: IndexStore::default(),
        }
    }
}

impl TreeIndex {
    fn new(key_def: KeyDef) -> Self {
        Self {
            key_def,
            store: IndexStore::default(),
        }
    }
}

impl RtreeIndex {
    fn new(key_def: KeyDef) -> Self {
        Self {
            key_def,
            store: IndexStore::default(),
        }
    }
}

impl BitsetIndex {
    fn new(key_def: KeyDef) -> Self {
        Self {
            key_def,
            store: IndexStore::default(),
        }
    }
}

/// A constructed index of one of the supported variants.
#[derive(Debug)]
pub enum SpaceIndex {
    Hash(HashIndex),
    Tree(TreeIndex),
    Rtree(RtreeIndex),
    Bitset(BitsetIndex),
}

impl SpaceIndex {
    /// The index's key definition.
    #[must_use]
    pub fn key_def(&self) -> &KeyDef {
        match self {
            Self::Hash(index) => &index.key_def,
            Self::Tree(index) => &index.key_def,
            Self::Rtree(index) => &index.key_def,
            Self::Bitset(index) => &index.key_def,
        }
    }

    /// The variant kind.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.key_def().kind
    }

    fn store(&self) -> &IndexStore {
        match self {
            Self::Hash(index) => &index.store,
            Self::Tree(index) => &index.store,
            Self::Rtree(index) => &index.store,
            Self::Bitset(index) => &index.store,
        }
    }

    fn store_mut(&mut self) -> &mut IndexStore {
        match self {
            Self::Hash(index) => &mut index.store,
            Self::Tree(index) => &mut index.store,
            Self::Rtree(index) => &mut index.store,
            Self::Bitset(index) => &mut index.store,
        }
    }

    fn into_store(self) -> IndexStore {
        match self {
            Self::Hash(index) => index.store,
            Self::Tree(index) => index.store,
            Self::Rtree(index) => index.store,
            Self::Bitset(index) => index.store,
        }
    }

    /// Insert a tuple, taking one reference on it.
    pub fn insert(&mut self, tuple: TupleRef) {
        self.store_mut().insert(tuple);
    }

    /// Remove a tuple, handing its reference back. `None` when the
    /// tuple is not in this index.
    pub fn remove(&mut self, tuple: &TupleRef) -> Option<TupleRef> {
        self.store_mut().remove(tuple)
    }

    /// Whether the index holds this exact tuple.
    #[must_use]
    pub fn contains(&self, tuple: &TupleRef) -> bool {
        self.store().contains(tuple)
    }

    /// Number of contained tuples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.store().len()
    }

    /// Positional iterator over contained tuples, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TupleRef> {
        self.store().iter()
    }
}

// ---------------------------------------------------------------------------
// Factory and validation
// ---------------------------------------------------------------------------

/// Decode an index kind from its wire discriminant.
///
/// This is where an unsupported kind from untrusted metadata surfaces.
pub fn decode_index_kind(raw: u8, index_id: IndexId, space_id: SpaceId) -> Result<IndexKind> {
    IndexKind::from_u8(raw).ok_or(EngineError::IndexType {
        index_id: index_id.get(),
        space_id: space_id.get(),
    })
}

/// Validate a key definition against the per-variant constraint table.
pub fn check_key_def(key_def: &KeyDef) -> Result<()> {
    let violation = |detail: &'static str| EngineError::ModifyIndex {
        index_id: key_def.index_id.get(),
        space_id: key_def.space_id.get(),
        detail,
    };

    match key_def.kind {
        IndexKind::Hash => {
            if !key_def.is_unique {
                return Err(violation("HASH index must be unique"));
            }
        }
        IndexKind::Tree => {}
        IndexKind::Rtree => {
            if key_def.part_count() != 1 {
                return Err(violation("RTREE index key can not be multipart"));
            }
            if key_def.is_unique {
                return Err(violation("RTREE index can not be unique"));
            }
        }
        IndexKind::Bitset => {
            if key_def.part_count() != 1 {
                return Err(violation("BITSET index key can not be multipart"));
            }
            if key_def.is_unique {
                return Err(violation("BITSET can not be unique"));
            }
        }
    }

    for part in &key_def.parts {
        match part.field_type {
            FieldType::Integer | FieldType::Number | FieldType::String | FieldType::Boolean => {
                if key_def.kind == IndexKind::Rtree {
                    return Err(violation("RTREE index field type must be ARRAY"));
                }
            }
            FieldType::Array => {
                if key_def.kind != IndexKind::Rtree {
                    return Err(violation("ARRAY field type is not supported"));
                }
            }
            FieldType::Any => {
                return Err(violation("index part type must be concrete"));
            }
        }
    }
    Ok(())
}

/// Validate and construct an index of the requested variant.
pub fn create_index(key_def: &KeyDef) -> Result<SpaceIndex> {
    check_key_def(key_def)?;
    let index = match key_def.kind {
        IndexKind::Hash => SpaceIndex::Hash(HashIndex::new(key_def.clone())),
        IndexKind::Tree => SpaceIndex::Tree(TreeIndex::new(key_def.clone())),
        IndexKind::Rtree => SpaceIndex::Rtree(RtreeIndex::new(key_def.clone())),
        IndexKind::Bitset => SpaceIndex::Bitset(BitsetIndex::new(key_def.clone())),
    };
    debug!(
        kind = key_def.kind.as_str(),
        index_id = key_def.index_id.get(),
        space_id = key_def.space_id.get(),
        "index created"
    );
    Ok(index)
}

/// Drop an index, releasing exactly one tuple reference per contained
/// tuple through the index's own iterator.
pub fn drop_index(index: SpaceIndex) {
    debug!(
        kind = index.kind().as_str(),
        tuples = index.count(),
        "index dropped"
    );
    let store = index.into_store();
    for tuple in store.entries {
        drop(tuple);
    }
}
