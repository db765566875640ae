//! # cardinal-ecs
//!
//! The typed component registry, archetype storage, and entity query
//! language (CQL) — the "C" in the simulation core.

pub mod archetype;
pub mod component;
pub mod cql;
pub mod entity;
pub mod filter;
pub mod world;

pub use archetype::{ArchetypeId, ArchetypeTable, Column};
pub use component::{Component, ComponentId, ComponentMeta, ComponentRegistry, RegistryError};
pub use cql::CqlError;
pub use entity::{EntityAllocator, EntityId};
pub use filter::Filter;
pub use world::{EcsError, EcsWorld};

#[cfg(test)]
mod restore_tests {
    use super::*;

    #[test]
    fn restore_entity_preserves_id_and_is_visible_to_search() {
        let mut world = EcsWorld::resume(10);
        world.restore_entity(EntityId::from_raw(3), vec![(ComponentId(0), vec![9])]);
        assert_eq!(world.get_component(EntityId::from_raw(3), ComponentId(0)), Some(&[9u8][..]));
        let fresh = world.spawn(vec![(ComponentId(0), vec![1])]);
        assert_eq!(fresh, EntityId::from_raw(11));
    }
}
