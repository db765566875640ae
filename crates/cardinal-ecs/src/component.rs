//! Component registration.
//!
//! Unlike a purely generic ECS, component identity here must survive a
//! process restart (I1): the numeric ID is not derived from `TypeId` — it is
//! assigned in registration order and persisted alongside the component name
//! so that a recovered world can reattach the same IDs to the same names.

use std::any::TypeId;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The stable numeric identity of a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

/// A value that can be stored as a component.
///
/// Components must be serialisable (the Store and the wire protocol both
/// move components as bytes) and `Send + Sync` so the ECS can be shared
/// across the scheduler and query-handling tasks.
pub trait Component: Send + Sync + 'static + Serialize + for<'de> Deserialize<'de> {
    /// The stable, unique name this component registers under.
    fn type_name() -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("component `{0}` is already registered")]
    DuplicateName(String),
    #[error("component registration attempted after the first tick")]
    RegistrationClosed,
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
}

/// Metadata recorded for a registered component type, independent of its
/// Rust representation — this is what gets persisted and what the CQL
/// layer resolves names against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: String,
}

/// One-shot component registry.
///
/// Registration happens entirely before the first tick (§4.C); afterwards
/// the registry is read-only at the type level, though the set of entities
/// carrying a given component continues to change every tick.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: HashMap<String, ComponentId>,
    by_type: HashMap<TypeId, ComponentId>,
    meta: Vec<ComponentMeta>,
    sealed: bool,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type `T`. Assigns the next integer ID in
    /// registration order. Fails on a duplicate name or once sealed.
    pub fn register<T: Component>(&mut self) -> Result<ComponentId, RegistryError> {
        if self.sealed {
            return Err(RegistryError::RegistrationClosed);
        }
        let name = T::type_name();
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let id = ComponentId(self.meta.len() as u32);
        self.by_name.insert(name.to_string(), id);
        self.by_type.insert(TypeId::of::<T>(), id);
        self.meta.push(ComponentMeta {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Reconstruct a registry from persisted metadata on startup, preserving
    /// the exact name/ID bijection it had before the restart (I1).
    #[must_use]
    pub fn from_persisted(meta: Vec<ComponentMeta>) -> Self {
        let mut by_name = HashMap::with_capacity(meta.len());
        for m in &meta {
            by_name.insert(m.name.clone(), m.id);
        }
        Self {
            by_name,
            by_type: HashMap::new(),
            meta,
            sealed: true,
        }
    }

    /// Seal the registry; no further registration is possible. Called by the
    /// scheduler immediately before running tick 0.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .or_else(|| self.by_name.get(T::type_name()).copied())
    }

    pub fn id_by_name(&self, name: &str) -> Result<ComponentId, RegistryError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownComponent(name.to_string()))
    }

    #[must_use]
    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.meta.get(id.0 as usize).map(|m| m.name.as_str())
    }

    #[must_use]
    pub fn all(&self) -> &[ComponentMeta] {
        &self.meta
    }
}
