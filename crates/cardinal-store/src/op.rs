//! The primitive state operations a tick batch is made of (§4.A).

use cardinal_ecs::{ComponentId, EntityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    CreateEntity {
        entity: EntityId,
        archetype: Vec<ComponentId>,
        components: Vec<(ComponentId, Vec<u8>)>,
    },
    DestroyEntity {
        entity: EntityId,
    },
    MoveEntity {
        entity: EntityId,
        new_archetype: Vec<ComponentId>,
        components: Vec<(ComponentId, Vec<u8>)>,
    },
    SetComponent {
        entity: EntityId,
        component: ComponentId,
        bytes: Vec<u8>,
    },
    AdvanceNonce {
        signer_hex: String,
        nonce: u64,
    },
    AdvanceTick,
}
