//! Field-name dictionaries.
//!
//! A dictionary maps field names to field numbers for one space. All
//! formats of a space share one dictionary through `Rc`; the last format
//! dropped releases it.

use std::collections::HashMap;
use std::rc::Rc;

use tbox_types::FieldDef;

/// Shared name→field-number dictionary.
#[derive(Debug, Default)]
pub struct TupleDictionary {
    names: Vec<String>,
    by_name: HashMap<String, u32>,
}

impl TupleDictionary {
    /// Dictionary of a space with no named fields.
    #[must_use]
    pub fn empty() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Build a dictionary from space field definitions.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when two fields share a name; names are
    /// unique within a space by definition.
    #[must_use]
    pub fn from_defs(defs: &[FieldDef]) -> Rc<Self> {
        let mut names = Vec::with_capacity(defs.len());
        let mut by_name = HashMap::with_capacity(defs.len());
        for (no, def) in defs.iter().enumerate() {
            let prev = by_name.insert(def.name.clone(), no as u32);
            debug_assert!(prev.is_none(), "duplicate field name {:?}", def.name);
            names.push(def.name.clone());
        }
        Rc::new(Self { names, by_name })
    }

    /// Number of named fields.
    #[must_use]
    pub fn field_count(&self) -> u32 {
        self.names.len() as u32
    }

    /// Name of field `field_no`, if it is named.
    #[must_use]
    pub fn name(&self, field_no: u32) -> Option<&str> {
        self.names.get(field_no as usize).map(String::as_str)
    }

    /// Field number for `name`.
    #[must_use]
    pub fn field_no(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }
}
