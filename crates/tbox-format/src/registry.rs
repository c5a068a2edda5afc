//! The format directory: id assignment, recycling, reference counting.
//!
//! A single `FormatRegistry` is created at engine init and threaded to
//! call sites by parameter; the engine runs on one cooperative thread,
//! so no interior locking exists. The directory doubles as its own free
//! list: a vacated slot stores the id of the next free slot, and a head
//! cursor points at the most recently freed one. Ids therefore stay
//! small, stable while held, and O(1) to reuse.

use std::fmt;
use std::mem::size_of;
use std::rc::Rc;

use tracing::debug;

use tbox_error::{EngineError, Result};
use tbox_types::{FieldDef, KeyDef};

use crate::dict::TupleDictionary;
use crate::format::{TupleFormat, TupleFormatVtab};

/// Highest id a registered format can hold.
pub const FORMAT_ID_MAX: u16 = u16::MAX - 1;

/// Directory capacity starts here and doubles.
const INITIAL_DIRECTORY_CAPACITY: usize = 16;

/// Identifier of a registered format. Not durable: ids are recycled as
/// formats come and go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FormatId(u16);

impl FormatId {
    /// Get the raw u16 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    #[inline]
    fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One directory entry: a live format, or a link in the free list.
#[derive(Debug)]
enum Slot {
    Occupied(Box<TupleFormat>),
    Free(Option<FormatId>),
}

/// The format directory.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    slots: Vec<Slot>,
    recycled: Option<FormatId>,
}

impl FormatRegistry {
    /// An empty directory. Backing storage is allocated on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, register, and fill in a format.
    ///
    /// Construction is transactional: if filling in the fields fails
    /// after a slot was assigned, the slot is reclaimed before the error
    /// is returned.
    pub fn new_format(
        &mut self,
        vtab: TupleFormatVtab,
        keys: &[&KeyDef],
        extra_size: u16,
        space_fields: &[FieldDef],
        dict: Option<Rc<TupleDictionary>>,
    ) -> Result<FormatId> {
        let format = TupleFormat::alloc(keys, space_fields.len() as u32, extra_size, vtab, dict)?;
        let id = self.register(Box::new(format))?;
        if let Err(err) = self.occupied_mut(id).create(keys, space_fields) {
            drop(self.deregister(id));
            return Err(err);
        }
        Ok(id)
    }

    /// Register an independently built duplicate of `src`: identical
    /// fields and vtab, shared dictionary, fresh id, zero references.
    pub fn dup(&mut self, src: FormatId) -> Result<FormatId> {
        let mut copy = self.occupied(src).clone();
        copy.id = None;
        copy.refs = 0;
        self.register(Box::new(copy))
    }

    /// Deregister and destroy a format regardless of its references.
    pub fn delete(&mut self, id: FormatId) {
        drop(self.deregister(id));
    }

    /// Take one reference on a format.
    pub fn ref_format(&mut self, id: FormatId) {
        let format = self.occupied_mut(id);
        format.refs += 1;
    }

    /// Drop one reference; the last reference destroys the format and
    /// recycles its id.
    pub fn unref_format(&mut self, id: FormatId) {
        let format = self.occupied_mut(id);
        debug_assert!(format.refs > 0, "unref of unreferenced format {id}");
        format.refs -= 1;
        if format.refs == 0 {
            self.delete(id);
        }
    }

    /// Look up a registered format.
    #[must_use]
    pub fn get(&self, id: FormatId) -> Option<&TupleFormat> {
        match self.slots.get(id.index()) {
            Some(Slot::Occupied(format)) => Some(format),
            _ => None,
        }
    }

    /// Look up a registered format mutably.
    pub fn get_mut(&mut self, id: FormatId) -> Option<&mut TupleFormat> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied(format)) => Some(format),
            _ => None,
        }
    }

    /// Number of registered formats.
    #[must_use]
    pub fn live_count(&self) -> u32 {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count() as u32
    }

    /// Ids on the free list, head first. Diagnostic accessor.
    #[must_use]
    pub fn free_ids(&self) -> Vec<FormatId> {
        let mut ids = Vec::new();
        let mut cursor = self.recycled;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = match self.slots.get(id.index()) {
                Some(Slot::Free(next)) => *next,
                _ => unreachable!("free list cursor {id} points at an occupied slot"),
            };
        }
        ids
    }

    /// Destroy every registered format and release the directory.
    pub fn clear(&mut self) {
        let live = self.live_count();
        self.slots.clear();
        self.slots.shrink_to_fit();
        self.recycled = None;
        debug!(live, "format directory cleared");
    }

    fn register(&mut self, mut format: Box<TupleFormat>) -> Result<FormatId> {
        let id = match self.recycled {
            Some(head) => {
                let next = match self.slots[head.index()] {
                    Slot::Free(next) => next,
                    Slot::Occupied(_) => {
                        unreachable!("free list head {head} points at an occupied slot")
                    }
                };
                self.recycled = next;
                head
            }
            None => {
                let len = self.slots.len();
                if len > usize::from(FORMAT_ID_MAX) {
                    return Err(EngineError::TupleFormatLimit {
                        capacity: len as u32,
                    });
                }
                if len == self.slots.capacity() {
                    let grow = self.slots.capacity().max(INITIAL_DIRECTORY_CAPACITY);
                    self.slots.try_reserve_exact(grow).map_err(|_| {
                        EngineError::oom(grow * size_of::<Slot>(), "format directory")
                    })?;
                }
                self.slots.push(Slot::Free(None));
                FormatId(len as u16)
            }
        };
        format.id = Some(id);
        self.slots[id.index()] = Slot::Occupied(format);
        debug!(%id, "format registered");
        Ok(id)
    }

    fn deregister(&mut self, id: FormatId) -> Box<TupleFormat> {
        let slot = std::mem::replace(&mut self.slots[id.index()], Slot::Free(self.recycled));
        self.recycled = Some(id);
        let Slot::Occupied(mut format) = slot else {
            unreachable!("deregister of vacant slot {id}")
        };
        format.id = None;
        debug!(%id, "format deregistered");
        format
    }

    fn occupied(&self, id: FormatId) -> &TupleFormat {
        self.get(id)
            .unwrap_or_else(|| unreachable!("format {id} is not registered"))
    }

    fn occupied_mut(&mut self, id: FormatId) -> &mut TupleFormat {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied(format)) => format,
            _ => unreachable!("format {id} is not registered"),
        }
    }
}
