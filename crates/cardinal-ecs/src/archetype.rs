//! Archetype storage.
//!
//! An archetype is the unordered set of component IDs an entity currently
//! carries. Entities sharing an archetype are grouped into one table with
//! one column per component, stored as raw bytes so the Store and the ECB
//! can move component data around without reifying Rust types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::entity::EntityId;

/// Deterministic identifier for an archetype, derived from its component set.
///
/// Two archetypes with the same component set always produce the same ID
/// regardless of the order components were added in (P6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchetypeId(pub u64);

impl ArchetypeId {
    #[must_use]
    pub fn from_components(types: &BTreeSet<ComponentId>) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for ty in types {
            ty.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// A single component column, storing one value per entity as raw bytes.
#[derive(Debug, Clone, Default)]
pub struct Column {
    pub data: Vec<Vec<u8>>,
}

impl Column {
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, bytes: Vec<u8>) {
        self.data.push(bytes);
    }

    #[must_use]
    pub fn get(&self, row: usize) -> Option<&[u8]> {
        self.data.get(row).map(Vec::as_slice)
    }

    pub fn set(&mut self, row: usize, bytes: Vec<u8>) {
        self.data[row] = bytes;
    }

    /// Remove a row, swapping the last row into its place. Returns the bytes
    /// that were at `row` before removal.
    pub fn swap_remove(&mut self, row: usize) -> Vec<u8> {
        self.data.swap_remove(row)
    }
}

/// A table of entities sharing one archetype, laid out struct-of-arrays.
#[derive(Debug, Clone)]
pub struct ArchetypeTable {
    pub id: ArchetypeId,
    pub components: BTreeSet<ComponentId>,
    pub entities: Vec<EntityId>,
    columns: std::collections::BTreeMap<ComponentId, Column>,
}

impl ArchetypeTable {
    #[must_use]
    pub fn new(components: BTreeSet<ComponentId>) -> Self {
        let id = ArchetypeId::from_components(&components);
        let columns = components.iter().map(|&c| (c, Column::default())).collect();
        Self {
            id,
            components,
            entities: Vec::new(),
            columns,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn has(&self, c: ComponentId) -> bool {
        self.components.contains(&c)
    }

    #[must_use]
    pub fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.entities.iter().position(|&e| e == entity)
    }

    #[must_use]
    pub fn column(&self, c: ComponentId) -> Option<&Column> {
        self.columns.get(&c)
    }

    pub fn column_mut(&mut self, c: ComponentId) -> Option<&mut Column> {
        self.columns.get_mut(&c)
    }

    /// Append a row for `entity`, providing bytes for every component in
    /// this archetype (order given by iterating `self.components`).
    pub fn push_row(&mut self, entity: EntityId, values: Vec<(ComponentId, Vec<u8>)>) {
        self.entities.push(entity);
        for (cid, bytes) in values {
            if let Some(col) = self.columns.get_mut(&cid) {
                col.push(bytes);
            }
        }
    }

    /// Remove the row for `entity`, returning its component bytes keyed by
    /// component ID (used when an entity moves to another archetype).
    pub fn remove_row(&mut self, entity: EntityId) -> Option<Vec<(ComponentId, Vec<u8>)>> {
        let row = self.row_of(entity)?;
        self.entities.swap_remove(row);
        let mut out = Vec::with_capacity(self.columns.len());
        for (&cid, col) in &mut self.columns {
            out.push((cid, col.swap_remove(row)));
        }
        Some(out)
    }
}
