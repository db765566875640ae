//! The built-in signer/persona component and its per-tick lookup index.
//!
//! §9's glossary describes a persona record as `(personaTag, signerAddress,
//! authorizedAddresses[])` "stored as a component on an entity" without
//! naming a concrete schema — this is that schema, registered by every
//! world under the name `"Persona"`. The index resolving `personaTag` to an
//! entity and signer is rebuilt at the start of each tick from whichever
//! archetype carries this component, exactly as the open-questions section
//! describes, rather than maintained incrementally.

use std::collections::HashMap;

use cardinal_ecs::{Component, ComponentRegistry, EcsWorld, EntityId, Filter, RegistryError};
use serde::{Deserialize, Serialize};

pub const PERSONA_COMPONENT_NAME: &str = "Persona";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaComponent {
    pub persona_tag: String,
    pub signer_address: String,
    pub public_key: String,
    pub authorized_addresses: Vec<String>,
}

impl Component for PersonaComponent {
    fn type_name() -> &'static str {
        PERSONA_COMPONENT_NAME
    }
}

/// `personaTag` (case-insensitive) → `(entity, signerAddress, publicKey)`,
/// snapshotted at the start of a tick.
#[derive(Debug, Default, Clone)]
pub struct PersonaIndex {
    by_tag: HashMap<String, (EntityId, String, String)>,
}

impl PersonaIndex {
    pub fn rebuild(world: &EcsWorld, registry: &ComponentRegistry) -> Result<Self, RegistryError> {
        let persona_id = registry.id_by_name(PERSONA_COMPONENT_NAME)?;
        let mut by_tag = HashMap::new();
        for entity in world.search(&Filter::contains([persona_id])) {
            let Some(bytes) = world.get_component(entity, persona_id) else {
                continue;
            };
            let Ok(persona) = rmp_serde::from_slice::<PersonaComponent>(bytes) else {
                continue;
            };
            by_tag.insert(
                persona.persona_tag.to_lowercase(),
                (entity, persona.signer_address, persona.public_key),
            );
        }
        Ok(Self { by_tag })
    }

    /// Resolve a persona tag (case-insensitively) to its bound entity,
    /// signer address, and public key.
    #[must_use]
    pub fn resolve(&self, persona_tag: &str) -> Option<&(EntityId, String, String)> {
        self.by_tag.get(&persona_tag.to_lowercase())
    }

    #[must_use]
    pub fn is_assigned(&self, persona_tag: &str) -> bool {
        self.by_tag.contains_key(&persona_tag.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardinal_ecs::ComponentRegistry;

    fn registry_with_persona() -> ComponentRegistry {
        let mut reg = ComponentRegistry::new();
        reg.register::<PersonaComponent>().unwrap();
        reg
    }

    #[test]
    fn rebuild_indexes_by_lowercased_tag() {
        let registry = registry_with_persona();
        let persona_id = registry.id_by_name(PERSONA_COMPONENT_NAME).unwrap();
        let mut world = EcsWorld::new();
        let persona = PersonaComponent {
            persona_tag: "CoolMage".to_string(),
            signer_address: "ab".repeat(20),
            public_key: "cd".repeat(32),
            authorized_addresses: vec![],
        };
        world.spawn(vec![(persona_id, rmp_serde::to_vec(&persona).unwrap())]);

        let index = PersonaIndex::rebuild(&world, &registry).unwrap();
        assert!(index.is_assigned("coolmage"));
        let (_, addr, _) = index.resolve("COOLMAGE").unwrap();
        assert_eq!(addr, &"ab".repeat(20));
    }

    #[test]
    fn unknown_tag_resolves_to_none() {
        let registry = registry_with_persona();
        let world = EcsWorld::new();
        let index = PersonaIndex::rebuild(&world, &registry).unwrap();
        assert!(index.resolve("nobody").is_none());
    }
}
