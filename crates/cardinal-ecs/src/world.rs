//! The ECS store: entities, archetypes, and the archetype index.
//!
//! [`EcsWorld`] holds one committed snapshot of ECS state. Component values
//! are stored as opaque bytes — callers serialise with their own [`Component`]
//! impl via `rmp_serde` before calling in, and deserialise what they get back.
//! This mirrors how the durable log and the wire protocol both move
//! components around, and keeps the ECB (which overlays this structure) free
//! of generic type parameters.

use std::collections::{BTreeSet, HashMap};

use crate::archetype::{ArchetypeId, ArchetypeTable};
use crate::component::ComponentId;
use crate::entity::{EntityAllocator, EntityId};
use crate::filter::Filter;

#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),
    #[error("entity {0} already has component {1:?}")]
    ComponentAlreadyPresent(EntityId, ComponentId),
    #[error("entity {0} has no component {1:?}")]
    ComponentAbsent(EntityId, ComponentId),
}

/// The canonical ECS state: entity allocation, archetype tables, and the
/// entity → archetype index (I2).
#[derive(Debug, Clone)]
pub struct EcsWorld {
    allocator: EntityAllocator,
    archetypes: HashMap<ArchetypeId, ArchetypeTable>,
    entity_archetype: HashMap<EntityId, ArchetypeId>,
    by_component_set: HashMap<BTreeSet<ComponentId>, ArchetypeId>,
}

impl EcsWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            archetypes: HashMap::new(),
            entity_archetype: HashMap::new(),
            by_component_set: HashMap::new(),
        }
    }

    /// Rebuild a world whose entity allocator must continue after a known
    /// highest-allocated ID, used when restoring from the Store.
    #[must_use]
    pub fn resume(highest_allocated: u64) -> Self {
        Self {
            allocator: EntityAllocator::resume_after(highest_allocated),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entity_archetype.len()
    }

    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    #[must_use]
    pub fn entity_archetype(&self, entity: EntityId) -> Option<ArchetypeId> {
        self.entity_archetype.get(&entity).copied()
    }

    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> Option<&ArchetypeTable> {
        self.archetypes.get(&id)
    }

    fn get_or_create_archetype(&mut self, components: BTreeSet<ComponentId>) -> ArchetypeId {
        if let Some(&id) = self.by_component_set.get(&components) {
            return id;
        }
        let table = ArchetypeTable::new(components.clone());
        let id = table.id;
        self.archetypes.insert(id, table);
        self.by_component_set.insert(components, id);
        id
    }

    /// Allocate a fresh entity carrying the given components.
    pub fn spawn(&mut self, components: Vec<(ComponentId, Vec<u8>)>) -> EntityId {
        let entity = self.allocator.allocate();
        let set: BTreeSet<ComponentId> = components.iter().map(|(c, _)| *c).collect();
        let archetype_id = self.get_or_create_archetype(set);
        self.archetypes
            .get_mut(&archetype_id)
            .expect("just created")
            .push_row(entity, components);
        self.entity_archetype.insert(entity, archetype_id);
        entity
    }

    /// Reinsert an entity at a specific ID, used when rebuilding a world
    /// from the Store on startup. Does not touch the allocator; callers
    /// construct the world with [`Self::resume`] first so freshly allocated
    /// IDs continue past the restored set.
    pub fn restore_entity(&mut self, entity: EntityId, components: Vec<(ComponentId, Vec<u8>)>) {
        let set: BTreeSet<ComponentId> = components.iter().map(|(c, _)| *c).collect();
        let archetype_id = self.get_or_create_archetype(set);
        self.archetypes
            .get_mut(&archetype_id)
            .expect("just created")
            .push_row(entity, components);
        self.entity_archetype.insert(entity, archetype_id);
    }

    /// Destroy an entity. Returns `true` if it existed.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let Some(archetype_id) = self.entity_archetype.remove(&entity) else {
            return false;
        };
        if let Some(table) = self.archetypes.get_mut(&archetype_id) {
            table.remove_row(entity);
        }
        true
    }

    #[must_use]
    pub fn get_component(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]> {
        let archetype_id = self.entity_archetype.get(&entity)?;
        let table = self.archetypes.get(archetype_id)?;
        let row = table.row_of(entity)?;
        table.column(component)?.get(row)
    }

    pub fn set_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        bytes: Vec<u8>,
    ) -> Result<(), EcsError> {
        let archetype_id = self
            .entity_archetype
            .get(&entity)
            .copied()
            .ok_or(EcsError::NoSuchEntity(entity))?;
        let table = self
            .archetypes
            .get_mut(&archetype_id)
            .expect("index consistency");
        let row = table.row_of(entity).expect("index consistency");
        let col = table
            .column_mut(component)
            .ok_or(EcsError::ComponentAbsent(entity, component))?;
        col.set(row, bytes);
        Ok(())
    }

    /// Add a component to an entity, moving it to the archetype for its new
    /// component set. Fails if the component is already present.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        bytes: Vec<u8>,
    ) -> Result<(), EcsError> {
        let archetype_id = self
            .entity_archetype
            .get(&entity)
            .copied()
            .ok_or(EcsError::NoSuchEntity(entity))?;
        let source = self.archetypes.get(&archetype_id).expect("index consistency");
        if source.has(component) {
            return Err(EcsError::ComponentAlreadyPresent(entity, component));
        }

        let mut values = self
            .archetypes
            .get_mut(&archetype_id)
            .unwrap()
            .remove_row(entity)
            .expect("index consistency");
        values.push((component, bytes));
        let new_set: BTreeSet<ComponentId> = values.iter().map(|(c, _)| *c).collect();
        let new_archetype = self.get_or_create_archetype(new_set);
        self.archetypes
            .get_mut(&new_archetype)
            .unwrap()
            .push_row(entity, values);
        self.entity_archetype.insert(entity, new_archetype);
        Ok(())
    }

    /// Remove a component from an entity, moving it to the archetype for its
    /// remaining component set. Fails if the component is absent.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> Result<Vec<u8>, EcsError> {
        let archetype_id = self
            .entity_archetype
            .get(&entity)
            .copied()
            .ok_or(EcsError::NoSuchEntity(entity))?;
        let source = self.archetypes.get(&archetype_id).expect("index consistency");
        if !source.has(component) {
            return Err(EcsError::ComponentAbsent(entity, component));
        }

        let values = self
            .archetypes
            .get_mut(&archetype_id)
            .unwrap()
            .remove_row(entity)
            .expect("index consistency");
        let (removed, remaining): (Vec<_>, Vec<_>) =
            values.into_iter().partition(|(c, _)| *c == component);
        let removed_bytes = removed.into_iter().next().map(|(_, b)| b).unwrap_or_default();

        let new_set: BTreeSet<ComponentId> = remaining.iter().map(|(c, _)| *c).collect();
        let new_archetype = self.get_or_create_archetype(new_set);
        self.archetypes
            .get_mut(&new_archetype)
            .unwrap()
            .push_row(entity, remaining);
        self.entity_archetype.insert(entity, new_archetype);
        Ok(removed_bytes)
    }

    /// Iterate matching entities in deterministic order: archetypes visited
    /// in ascending `ArchetypeId` order, entities within in insertion order.
    #[must_use]
    pub fn search(&self, filter: &Filter) -> Vec<EntityId> {
        let mut archetype_ids: Vec<ArchetypeId> = self
            .archetypes
            .values()
            .filter(|t| filter.matches(t))
            .map(|t| t.id)
            .collect();
        archetype_ids.sort_by_key(|id| id.0);

        let mut out = Vec::new();
        for id in archetype_ids {
            out.extend(self.archetypes[&id].entities.iter().copied());
        }
        out
    }
}

impl Default for EcsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_places_entity_in_archetype() {
        let mut world = EcsWorld::new();
        let e = world.spawn(vec![(ComponentId(1), vec![1])]);
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.get_component(e, ComponentId(1)), Some(&[1u8][..]));
    }

    #[test]
    fn add_component_moves_archetype() {
        let mut world = EcsWorld::new();
        let e = world.spawn(vec![(ComponentId(1), vec![1])]);
        let before = world.entity_archetype(e);
        world.add_component(e, ComponentId(2), vec![2]).unwrap();
        let after = world.entity_archetype(e);
        assert_ne!(before, after);
        assert_eq!(world.get_component(e, ComponentId(2)), Some(&[2u8][..]));
    }

    #[test]
    fn add_existing_component_fails() {
        let mut world = EcsWorld::new();
        let e = world.spawn(vec![(ComponentId(1), vec![1])]);
        assert!(world.add_component(e, ComponentId(1), vec![9]).is_err());
    }

    #[test]
    fn remove_absent_component_fails() {
        let mut world = EcsWorld::new();
        let e = world.spawn(vec![(ComponentId(1), vec![1])]);
        assert!(world.remove_component(e, ComponentId(2)).is_err());
    }

    #[test]
    fn despawn_removes_from_archetype() {
        let mut world = EcsWorld::new();
        let e = world.spawn(vec![(ComponentId(1), vec![1])]);
        assert!(world.despawn(e));
        assert_eq!(world.entity_count(), 0);
        assert!(!world.despawn(e));
    }

    #[test]
    fn search_is_deterministic_across_runs() {
        let mut a = EcsWorld::new();
        let mut b = EcsWorld::new();
        for w in [&mut a, &mut b] {
            w.spawn(vec![(ComponentId(1), vec![0])]);
            w.spawn(vec![(ComponentId(1), vec![0]), (ComponentId(2), vec![0])]);
            w.spawn(vec![(ComponentId(3), vec![0])]);
        }
        let filter = Filter::contains([ComponentId(1)]);
        assert_eq!(a.search(&filter), b.search(&filter));
    }

    #[test]
    fn cql_scenario_counts() {
        let mut world = EcsWorld::new();
        for _ in 0..75 {
            world.spawn(vec![(ComponentId(0), vec![0])]);
        }
        for _ in 0..100 {
            world.spawn(vec![(ComponentId(0), vec![0]), (ComponentId(1), vec![0])]);
        }
        world.spawn(vec![(ComponentId(2), vec![0])]);

        let alpha = ComponentId(0);
        let beta = ComponentId(1);

        assert_eq!(
            world
                .search(&Filter::And(
                    Box::new(Filter::contains([alpha])),
                    Box::new(Filter::contains([beta])),
                ))
                .len(),
            100
        );
        assert_eq!(
            world
                .search(&Filter::Or(
                    Box::new(Filter::contains([alpha])),
                    Box::new(Filter::contains([beta])),
                ))
                .len(),
            175
        );
        assert_eq!(world.search(&Filter::exact([alpha])).len(), 75);
        assert_eq!(world.search(&Filter::exact([beta])).len(), 0);
        assert_eq!(
            world
                .search(&Filter::Not(Box::new(Filter::Or(
                    Box::new(Filter::contains([alpha])),
                    Box::new(Filter::contains([beta])),
                ))))
                .len(),
            1
        );
    }
}
