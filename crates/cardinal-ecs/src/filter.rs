//! Entity search filters (§4.C).
//!
//! A [`Filter`] evaluates against an archetype's component set. Iteration
//! order over matching entities is deterministic: archetypes are visited in
//! ascending [`ArchetypeId`] order and entities within an archetype in
//! insertion order, so the same registration history always produces the
//! same sequence (P6).

use std::collections::BTreeSet;

use crate::archetype::ArchetypeTable;
use crate::component::ComponentId;

/// A filter over an archetype's component set.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Archetype's component set equals exactly this set.
    Exact(BTreeSet<ComponentId>),
    /// Archetype's component set is a superset of this set.
    Contains(BTreeSet<ComponentId>),
    Not(Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    #[must_use]
    pub fn exact(components: impl IntoIterator<Item = ComponentId>) -> Self {
        Filter::Exact(components.into_iter().collect())
    }

    #[must_use]
    pub fn contains(components: impl IntoIterator<Item = ComponentId>) -> Self {
        Filter::Contains(components.into_iter().collect())
    }

    #[must_use]
    pub fn matches(&self, table: &ArchetypeTable) -> bool {
        self.matches_set(&table.components)
    }

    /// Evaluate against a raw component set rather than a stored archetype
    /// table — used by the ECB overlay, where an entity's effective
    /// archetype for this tick may not correspond to any committed table.
    #[must_use]
    pub fn matches_set(&self, components: &BTreeSet<ComponentId>) -> bool {
        match self {
            Filter::Exact(set) => components == set,
            Filter::Contains(set) => set.is_subset(components),
            Filter::Not(inner) => !inner.matches_set(components),
            Filter::And(a, b) => a.matches_set(components) && b.matches_set(components),
            Filter::Or(a, b) => a.matches_set(components) || b.matches_set(components),
        }
    }
}
