//! The entity-command buffer (§4.B).
//!
//! Every system in a tick reads and writes through one [`Ecb`]. It is
//! realised here as a working copy of the last-committed [`EcsWorld`] plus
//! an ordered op log, rather than a sparse overlay map: `EcsWorld` is cheap
//! enough to clone at tick granularity and gives every read the full
//! committed-plus-pending view for free. The isolation guarantee (P4) comes
//! from the scheduler: the working copy only replaces canonical state after
//! `CommitBatch` succeeds, and is dropped untouched on failure.

use cardinal_ecs::{ComponentId, EcsError, EcsWorld, EntityId, Filter};
use cardinal_store::Op;

/// The read/write surface systems operate on during a tick.
pub struct Ecb {
    world: EcsWorld,
    ops: Vec<Op>,
}

impl Ecb {
    /// Start a new tick's buffer over the given committed snapshot.
    #[must_use]
    pub fn new(snapshot: EcsWorld) -> Self {
        Self {
            world: snapshot,
            ops: Vec::new(),
        }
    }

    #[must_use]
    pub fn get_component(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]> {
        self.world.get_component(entity, component)
    }

    #[must_use]
    pub fn search(&self, filter: &Filter) -> Vec<EntityId> {
        self.world.search(filter)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.world.entity_count()
    }

    pub fn spawn(&mut self, components: Vec<(ComponentId, Vec<u8>)>) -> EntityId {
        let archetype: Vec<ComponentId> = components.iter().map(|(c, _)| *c).collect();
        let entity = self.world.spawn(components.clone());
        self.ops.push(Op::CreateEntity {
            entity,
            archetype,
            components,
        });
        entity
    }

    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let existed = self.world.despawn(entity);
        if existed {
            self.ops.push(Op::DestroyEntity { entity });
        }
        existed
    }

    pub fn set_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        bytes: Vec<u8>,
    ) -> Result<(), EcsError> {
        self.world.set_component(entity, component, bytes.clone())?;
        self.ops.push(Op::SetComponent {
            entity,
            component,
            bytes,
        });
        Ok(())
    }

    /// Read, transform, and write back a single component in one step.
    pub fn update_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        f: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Result<(), EcsError> {
        let current = self
            .world
            .get_component(entity, component)
            .ok_or(EcsError::ComponentAbsent(entity, component))?;
        let next = f(current);
        self.set_component(entity, component, next)
    }

    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        bytes: Vec<u8>,
    ) -> Result<(), EcsError> {
        self.world.add_component(entity, component, bytes)?;
        self.push_move_op(entity);
        Ok(())
    }

    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> Result<Vec<u8>, EcsError> {
        let removed = self.world.remove_component(entity, component)?;
        self.push_move_op(entity);
        Ok(removed)
    }

    fn push_move_op(&mut self, entity: EntityId) {
        let archetype_id = self
            .world
            .entity_archetype(entity)
            .expect("entity still exists after move");
        let table = self.world.archetype(archetype_id).expect("index consistency");
        let new_archetype: Vec<ComponentId> = table.components.iter().copied().collect();
        let components = new_archetype
            .iter()
            .map(|c| {
                (
                    *c,
                    self.world
                        .get_component(entity, *c)
                        .expect("component present in its own archetype")
                        .to_vec(),
                )
            })
            .collect();
        self.ops.push(Op::MoveEntity {
            entity,
            new_archetype,
            components,
        });
    }

    /// Produce the ordered op log for this tick and the resulting world,
    /// consuming the buffer. Called once the scheduler has decided to commit.
    #[must_use]
    pub fn flush(self) -> (EcsWorld, Vec<Op>) {
        (self.world, self.ops)
    }

    /// Discard the buffer without flushing — the working copy and its op
    /// log are simply dropped; canonical state never saw them.
    pub fn reset(self) {}
}

/// The read-only half of an [`Ecb`], handed to systems that only query state.
pub struct ReadOnlyEcb<'a> {
    inner: &'a Ecb,
}

impl<'a> ReadOnlyEcb<'a> {
    #[must_use]
    pub fn new(inner: &'a Ecb) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn get_component(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]> {
        self.inner.get_component(entity, component)
    }

    #[must_use]
    pub fn search(&self, filter: &Filter) -> Vec<EntityId> {
        self.inner.search(filter)
    }
}
