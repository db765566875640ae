//! The tick scheduler: `Idle → Draining → Running → Finalizing →
//! (Committed | Rolled-Back) → Idle` (§4.G).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use cardinal_crypto::TxHash;
use cardinal_ecb::Ecb;
use cardinal_ecs::{ComponentRegistry, EcsWorld};
use cardinal_receipts::{EventHub, Receipt, ReceiptHistory, DEFAULT_CAPACITY};
use cardinal_store::{Op, PendingBatch, Store};
use cardinal_tx::{MessageTypeId, PersonaIndex, QueuedTx, TxQueue};
use tracing::{error, info, warn};

use crate::context::{ReceiptOutcome, TickContext};
use crate::error::SchedError;
use crate::system::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Idle,
    Draining,
    Running,
    Finalizing,
    Committed,
    RolledBack,
}

pub struct Scheduler {
    store: Store,
    world: EcsWorld,
    registry: ComponentRegistry,
    tx_queue: Arc<TxQueue>,
    init_systems: Vec<Box<dyn System>>,
    systems: Vec<Box<dyn System>>,
    receipts: ReceiptHistory,
    events: EventHub,
    current_tick: u64,
    ran_init: bool,
    state: TickState,
}

impl Scheduler {
    /// Build a scheduler over an opened store, performing startup recovery
    /// first. A pending batch found on open holds an already-deterministic
    /// op log (it is exactly what a tick's systems produced before the
    /// process died) — recovering it means re-applying those ops, not
    /// re-running systems. If that replay itself fails, the pending batch is
    /// discarded and the tick is lost, consistent with I3.
    pub fn new(
        mut store: Store,
        pending: Option<PendingBatch>,
        registry: ComponentRegistry,
        tx_queue: Arc<TxQueue>,
        init_systems: Vec<Box<dyn System>>,
        systems: Vec<Box<dyn System>>,
        receipt_capacity: usize,
    ) -> Result<Self, SchedError> {
        if let Some(batch) = pending {
            warn!(tick = batch.tick, ops = batch.ops.len(), "recovering pending batch");
            if let Err(err) = store.commit_batch() {
                error!(%err, "pending batch replay failed, discarding");
                store.discard_batch()?;
            }
        }

        let highest = store.highest_allocated_entity()?;
        let mut world = EcsWorld::resume(highest);
        for (entity, record) in store.load_all_entities()? {
            world.restore_entity(entity, record.components);
        }
        let current_tick = store.current_tick()?;

        Ok(Self {
            store,
            world,
            registry,
            tx_queue,
            init_systems,
            systems,
            receipts: ReceiptHistory::new(receipt_capacity),
            events: EventHub::new(),
            current_tick,
            ran_init: false,
            state: TickState::Idle,
        })
    }

    #[must_use]
    pub fn with_default_capacity(
        store: Store,
        pending: Option<PendingBatch>,
        registry: ComponentRegistry,
        tx_queue: Arc<TxQueue>,
        init_systems: Vec<Box<dyn System>>,
        systems: Vec<Box<dyn System>>,
    ) -> Result<Self, SchedError> {
        Self::new(
            store,
            pending,
            registry,
            tx_queue,
            init_systems,
            systems,
            DEFAULT_CAPACITY,
        )
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    #[must_use]
    pub fn state(&self) -> TickState {
        self.state
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    #[must_use]
    pub fn receipts(&self) -> &ReceiptHistory {
        &self.receipts
    }

    #[must_use]
    pub fn world(&self) -> &EcsWorld {
        &self.world
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Drive one full tick. Systems run sequentially in registration order;
    /// a receipt exists for every drained transaction whether or not any
    /// system touched it.
    pub fn run_tick(&mut self) -> Result<(), SchedError> {
        self.state = TickState::Draining;
        let drained = self.tx_queue.drain();
        let persona = PersonaIndex::rebuild(&self.world, &self.registry)?;
        let tick = self.current_tick + 1;

        self.state = TickState::Running;
        let started_at = SystemTime::now();
        let mut ecb = Ecb::new(self.world.clone());
        let mut outcomes: HashMap<TxHash, ReceiptOutcome> = HashMap::new();

        if let Err(err) = self.run_systems(tick, started_at, &mut ecb, &persona, &drained, &mut outcomes) {
            warn!(tick, %err, "tick failed, discarding ECB");
            ecb.reset();
            self.state = TickState::Idle;
            return Err(err);
        }

        self.state = TickState::Finalizing;
        let (new_world, mut ops) = ecb.flush();
        ops.push(Op::AdvanceTick);

        match self.commit(tick, ops) {
            Ok(()) => {
                self.state = TickState::Committed;
                self.world = new_world;
                self.current_tick = tick;

                let receipts = self.build_receipts(tick, &drained, outcomes);
                self.receipts.push(tick, receipts.clone());
                for receipt in &receipts {
                    self.events.publish(format!("receipt:{}", receipt.tx_hash));
                }
                info!(tick, receipts = receipts.len(), "tick committed");

                self.state = TickState::Idle;
                Ok(())
            }
            Err(err) => {
                self.state = TickState::RolledBack;
                error!(tick, %err, "commit failed");
                let _ = self.store.discard_batch();
                self.state = TickState::Idle;
                Err(err)
            }
        }
    }

    fn commit(&self, tick: u64, ops: Vec<Op>) -> Result<(), SchedError> {
        self.store.begin_batch(tick)?;
        for op in ops {
            self.store.append_op(op)?;
        }
        self.store.commit_batch()?;
        Ok(())
    }

    fn run_systems(
        &mut self,
        tick: u64,
        started_at: SystemTime,
        ecb: &mut Ecb,
        persona: &PersonaIndex,
        drained: &HashMap<MessageTypeId, Vec<QueuedTx>>,
        outcomes: &mut HashMap<TxHash, ReceiptOutcome>,
    ) -> Result<(), SchedError> {
        if !self.ran_init {
            for system in &self.init_systems {
                let mut ctx = TickContext::new(tick, started_at, ecb, persona, drained, outcomes);
                system
                    .run(&mut ctx)
                    .map_err(|e| SchedError::System(system.name().to_string(), e))?;
            }
            self.ran_init = true;
        }
        for system in &self.systems {
            let mut ctx = TickContext::new(tick, started_at, ecb, persona, drained, outcomes);
            system
                .run(&mut ctx)
                .map_err(|e| SchedError::System(system.name().to_string(), e))?;
        }
        Ok(())
    }

    fn build_receipts(
        &self,
        tick: u64,
        drained: &HashMap<MessageTypeId, Vec<QueuedTx>>,
        mut outcomes: HashMap<TxHash, ReceiptOutcome>,
    ) -> Vec<Receipt> {
        let mut msg_types: Vec<&MessageTypeId> = drained.keys().collect();
        msg_types.sort_by_key(|m| m.0);

        let mut receipts = Vec::new();
        for msg_type in msg_types {
            for tx in &drained[msg_type] {
                let Ok(hash) = tx.envelope.tx_hash() else {
                    continue;
                };
                let outcome = outcomes.remove(&hash).unwrap_or_default();
                receipts.push(Receipt {
                    tx_hash: hash,
                    tick,
                    result: outcome.result,
                    errors: outcome.errors,
                });
            }
        }
        receipts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardinal_ecs::ComponentId;
    use cardinal_tx::{Envelope, PERSONA_COMPONENT_NAME};
    use serde_json::json;

    struct SpawnOneSystem;

    impl System for SpawnOneSystem {
        fn name(&self) -> &str {
            "spawn-one"
        }

        fn run(&self, ctx: &mut TickContext<'_>) -> Result<(), crate::error::SystemError> {
            ctx.ecb.spawn(vec![(ComponentId(0), vec![1])]);
            Ok(())
        }
    }

    struct FailingSystem;

    impl System for FailingSystem {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _ctx: &mut TickContext<'_>) -> Result<(), crate::error::SystemError> {
            Err(crate::error::SystemError::msg("boom"))
        }
    }

    fn fresh_scheduler(systems: Vec<Box<dyn System>>) -> (Scheduler, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (store, pending) = Store::open(dir.path().join("s.redb")).unwrap();
        let registry = ComponentRegistry::new();
        let queue = Arc::new(TxQueue::new());
        let scheduler =
            Scheduler::new(store, pending, registry, queue, Vec::new(), systems, 4).unwrap();
        (scheduler, dir)
    }

    #[test]
    fn successful_tick_advances_current_tick_and_world() {
        let (mut scheduler, _dir) = fresh_scheduler(vec![Box::new(SpawnOneSystem)]);
        scheduler.run_tick().unwrap();
        assert_eq!(scheduler.current_tick(), 1);
        assert_eq!(scheduler.world().entity_count(), 1);
    }

    #[test]
    fn failing_system_discards_ecb_and_leaves_tick_unchanged() {
        let (mut scheduler, _dir) = fresh_scheduler(vec![Box::new(FailingSystem)]);
        assert!(scheduler.run_tick().is_err());
        assert_eq!(scheduler.current_tick(), 0);
        assert_eq!(scheduler.world().entity_count(), 0);
    }

    #[test]
    fn receipt_exists_for_every_drained_transaction_even_with_no_system_touch() {
        let (mut scheduler, _dir) = fresh_scheduler(Vec::new());
        let envelope = Envelope {
            persona_tag: Some("Tag".to_string()),
            namespace: "ns".to_string(),
            nonce: 1,
            signature: "deadbeef".to_string(),
            body: json!({}),
        };
        scheduler.tx_queue.add_transaction(QueuedTx {
            msg_type: MessageTypeId(0),
            envelope,
            value: json!({}),
        });
        scheduler.run_tick().unwrap();
        let window = scheduler.receipts().window_since(1);
        assert_eq!(window.receipts.len(), 1);
        assert!(window.receipts[0].result.is_none());
        assert!(window.receipts[0].errors.is_empty());
    }

    #[test]
    fn recovery_commits_a_pending_batch_left_from_a_prior_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.redb");
        {
            let (store, _pending) = Store::open(&path).unwrap();
            store.begin_batch(1).unwrap();
            store
                .append_op(Op::CreateEntity {
                    entity: cardinal_ecs::EntityId::from_raw(1),
                    archetype: vec![ComponentId(0)],
                    components: vec![(ComponentId(0), vec![9])],
                })
                .unwrap();
            store.append_op(Op::AdvanceTick).unwrap();
        }
        let (store, pending) = Store::open(&path).unwrap();
        assert!(pending.is_some());
        let scheduler = Scheduler::new(
            store,
            pending,
            ComponentRegistry::new(),
            Arc::new(TxQueue::new()),
            Vec::new(),
            Vec::new(),
            4,
        )
        .unwrap();
        assert_eq!(scheduler.current_tick(), 1);
        assert_eq!(scheduler.world().entity_count(), 1);
    }

    #[allow(dead_code)]
    fn persona_component_name_is_reserved() {
        let _ = PERSONA_COMPONENT_NAME;
    }
}
