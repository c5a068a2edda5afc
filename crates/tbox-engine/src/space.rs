//! Spaces: a format, a set of indexes, and the replace operation.

use std::rc::Rc;

use tracing::debug;

use tbox_error::{EngineError, Result};
use tbox_format::FormatId;
use tbox_types::{SpaceId, TupleRef};

use crate::index::SpaceIndex;
use crate::recovery::ReplaceMode;

/// Duplicate-key handling requested for a replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupMode {
    /// The new tuple must not already be present.
    Insert,
    /// The new tuple must displace an existing one.
    Replace,
    /// Insert or displace, whichever applies.
    ReplaceOrInsert,
}

/// A table of tuples sharing one format and a set of indexes.
///
/// Index 0, when present, is the primary key.
#[derive(Debug)]
pub struct Space {
    id: SpaceId,
    format: FormatId,
    indexes: Vec<SpaceIndex>,
    /// Tuples accumulated while replace runs in bookkeeping mode,
    /// waiting for the primary key to be built.
    recovery_rows: Vec<TupleRef>,
}

impl Space {
    /// A space with no indexes yet.
    #[must_use]
    pub fn new(id: SpaceId, format: FormatId) -> Self {
        Self {
            id,
            format,
            indexes: Vec::new(),
            recovery_rows: Vec::new(),
        }
    }

    /// Space identifier.
    #[must_use]
    pub fn id(&self) -> SpaceId {
        self.id
    }

    /// The registered format backing this space's tuples.
    #[must_use]
    pub fn format(&self) -> FormatId {
        self.format
    }

    /// Attach a constructed index. The first one attached is the
    /// primary key.
    pub fn attach_index(&mut self, index: SpaceIndex) {
        self.indexes.push(index);
    }

    /// Detach the last-attached index, if any.
    pub fn detach_index(&mut self) -> Option<SpaceIndex> {
        self.indexes.pop()
    }

    /// The attached indexes, primary first.
    #[must_use]
    pub fn indexes(&self) -> &[SpaceIndex] {
        &self.indexes
    }

    /// The primary key, when built.
    #[must_use]
    pub fn primary_key(&self) -> Option<&SpaceIndex> {
        self.indexes.first()
    }

    /// Tuples waiting in the recovery buffer.
    #[must_use]
    pub fn recovery_row_count(&self) -> usize {
        self.recovery_rows.len()
    }

    /// Replace `old` with `new` in every index.
    ///
    /// Either tuple may be absent: `old == None` is an insert, `new ==
    /// None` a delete. In [`ReplaceMode::Bookkeeping`] nothing touches
    /// the indexes; tuples land in the recovery buffer instead. Returns
    /// the displaced tuple when one was removed.
    pub fn replace(
        &mut self,
        mode: ReplaceMode,
        old: Option<&TupleRef>,
        new: Option<&TupleRef>,
        dup: DupMode,
    ) -> Result<Option<TupleRef>> {
        match mode {
            ReplaceMode::Bookkeeping => {
                if let Some(old) = old {
                    let at = self
                        .recovery_rows
                        .iter()
                        .position(|t| Rc::ptr_eq(t, old))
                        .ok_or_else(|| {
                            EngineError::internal(format!(
                                "tuple to replace is not in the recovery buffer of space {}",
                                self.id
                            ))
                        })?;
                    self.recovery_rows.remove(at);
                }
                if let Some(new) = new {
                    self.recovery_rows.push(Rc::clone(new));
                }
                Ok(None)
            }
            ReplaceMode::Apply => {
                let mut displaced = None;
                if let Some(new) = new {
                    if dup == DupMode::Insert && old.is_none() {
                        for index in &self.indexes {
                            if index.key_def().is_unique && index.contains(new) {
                                return Err(EngineError::internal(format!(
                                    "duplicate tuple in unique index {} of space {}",
                                    index.key_def().index_id,
                                    self.id
                                )));
                            }
                        }
                    }
                }
                if let Some(old) = old {
                    for index in &mut self.indexes {
                        let removed = index.remove(old).ok_or_else(|| {
                            EngineError::internal(format!(
                                "tuple to replace not found in index {} of space {}",
                                index.key_def().index_id,
                                self.id
                            ))
                        })?;
                        displaced = Some(removed);
                    }
                }
                if let Some(new) = new {
                    for index in &mut self.indexes {
                        index.insert(Rc::clone(new));
                    }
                }
                Ok(displaced)
            }
        }
    }

    /// Move the recovery buffer into the primary key.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when the space has no primary index.
    pub fn build_primary_key(&mut self) {
        debug_assert!(
            !self.indexes.is_empty(),
            "space {} has no primary index to build",
            self.id
        );
        let rows = std::mem::take(&mut self.recovery_rows);
        debug!(space = self.id.get(), rows = rows.len(), "building primary key");
        if let Some(primary) = self.indexes.first_mut() {
            for tuple in rows {
                primary.insert(tuple);
            }
        }
    }

    /// Populate every secondary index from the primary.
    pub fn build_all_keys(&mut self) {
        let Some((primary, secondaries)) = self.indexes.split_first_mut() else {
            return;
        };
        debug!(
            space = self.id.get(),
            rows = primary.count(),
            secondaries = secondaries.len(),
            "building secondary keys"
        );
        for tuple in primary.iter() {
            for index in secondaries.iter_mut() {
                index.insert(Rc::clone(tuple));
            }
        }
    }
}
