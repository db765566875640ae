//! The durable append-only key-value log (§4.A).
//!
//! Two logical regions live in one `redb` database: `final` state (the
//! latest committed tick) and a `pending` batch keyed by the tick currently
//! being produced. `CommitBatch` relies on `redb`'s own write-transaction
//! atomicity rather than hand-rolled fsync ordering, so a power loss at any
//! point yields either the pre-tick or post-tick state, never a torn mix (I3).

use std::path::Path;
use std::sync::Arc;

use cardinal_ecs::{ComponentId, ComponentMeta, EntityId};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::op::Op;

const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const ENTITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entities");
const NONCES: TableDefinition<&str, ()> = TableDefinition::new("nonces");
const PENDING: TableDefinition<&str, &[u8]> = TableDefinition::new("pending");

const KEY_COMPONENT_REGISTRY: &str = "component_registry";
const KEY_TICK_COUNTER: &str = "tick_counter";
const KEY_PENDING_TICK: &str = "tick";
const KEY_PENDING_OPS: &str = "ops";

/// The persisted shape of one entity's archetype membership and component
/// bytes — the unit written to the `entities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub archetype: Vec<ComponentId>,
    pub components: Vec<(ComponentId, Vec<u8>)>,
}

/// Metadata about an in-flight (not yet committed) batch.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub tick: u64,
    pub ops: Vec<Op>,
}

/// Handle to the durable log. Cheaply cloneable — every method takes `&self`
/// and `redb::Database` is internally safe to share across threads, so the
/// HTTP-side nonce writes and the scheduler's tick commits can hold
/// independent owned handles to the same underlying file.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database file at `path` and surface whether a
    /// pending batch was left over from an unclean shutdown.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Option<PendingBatch>)> {
        let db = Arc::new(Database::create(path)?);
        let store = Self { db };
        store.ensure_tables()?;
        let pending = store.read_pending_batch()?;
        if let Some(batch) = &pending {
            warn!(tick = batch.tick, ops = batch.ops.len(), "found pending batch on open");
        } else {
            info!("store opened with no pending batch");
        }
        Ok((store, pending))
    }

    fn ensure_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(META)?;
            txn.open_table(ENTITIES)?;
            txn.open_table(NONCES)?;
            txn.open_table(PENDING)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn read_pending_batch(&self) -> Result<Option<PendingBatch>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PENDING)?;
        let Some(tick_bytes) = table.get(KEY_PENDING_TICK)? else {
            return Ok(None);
        };
        let tick = u64::from_le_bytes(tick_bytes.value().try_into().expect("8 bytes"));
        let ops = match table.get(KEY_PENDING_OPS)? {
            Some(bytes) => rmp_serde::from_slice(bytes.value())?,
            None => Vec::new(),
        };
        Ok(Some(PendingBatch { tick, ops }))
    }

    /// Begin collecting ops for `tick`. Re-beginning the same tick (as
    /// happens during recovery replay) is a no-op; beginning a different
    /// tick while one is already pending is an error.
    pub fn begin_batch(&self, tick: u64) -> Result<()> {
        if let Some(existing) = self.read_pending_batch()? {
            if existing.tick != tick {
                return Err(StoreError::BatchConflict {
                    existing: existing.tick,
                    requested: tick,
                });
            }
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PENDING)?;
            table.insert(KEY_PENDING_TICK, tick.to_le_bytes().as_slice())?;
            table.insert(KEY_PENDING_OPS, rmp_serde::to_vec(&Vec::<Op>::new())?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Append one op to the pending batch.
    pub fn append_op(&self, op: Op) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PENDING)?;
            let mut ops: Vec<Op> = match table.get(KEY_PENDING_OPS)? {
                Some(bytes) => rmp_serde::from_slice(bytes.value())?,
                None => Vec::new(),
            };
            ops.push(op);
            table.insert(KEY_PENDING_OPS, rmp_serde::to_vec(&ops)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Atomically apply the pending batch's ops to final state and clear it.
    pub fn commit_batch(&self) -> Result<()> {
        let pending = self
            .read_pending_batch()?
            .ok_or(StoreError::NoPendingBatch("commit"))?;

        let txn = self.db.begin_write()?;
        {
            let mut entities = txn.open_table(ENTITIES)?;
            let mut meta = txn.open_table(META)?;
            let mut nonces = txn.open_table(NONCES)?;

            for op in &pending.ops {
                apply_op(&mut entities, &mut meta, &mut nonces, op)?;
            }

            let mut pending_table = txn.open_table(PENDING)?;
            pending_table.remove(KEY_PENDING_TICK)?;
            pending_table.remove(KEY_PENDING_OPS)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Drop the pending batch without applying it (P4: ECB isolation).
    pub fn discard_batch(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PENDING)?;
            table.remove(KEY_PENDING_TICK)?;
            table.remove(KEY_PENDING_OPS)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn persist_component_registry(&self, meta: &[ComponentMeta]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(META)?;
            table.insert(KEY_COMPONENT_REGISTRY, rmp_serde::to_vec(meta)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn load_component_registry(&self) -> Result<Vec<ComponentMeta>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;
        match table.get(KEY_COMPONENT_REGISTRY)? {
            Some(bytes) => Ok(rmp_serde::from_slice(bytes.value())?),
            None => Ok(Vec::new()),
        }
    }

    pub fn current_tick(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;
        match table.get(KEY_TICK_COUNTER)? {
            Some(bytes) => Ok(u64::from_le_bytes(bytes.value().try_into().expect("8 bytes"))),
            None => Ok(0),
        }
    }

    pub fn load_entity(&self, entity: EntityId) -> Result<Option<EntityRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        match table.get(entity.get())? {
            Some(bytes) => Ok(Some(rmp_serde::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn highest_allocated_entity(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        Ok(table.iter()?.next_back().transpose()?.map(|(k, _)| k.value()).unwrap_or(0))
    }

    pub fn is_nonce_used(&self, signer_hex: &str, nonce: u64) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NONCES)?;
        Ok(table.get(nonce_key(signer_hex, nonce).as_str())?.is_some())
    }

    /// Record a `(signer, nonce)` pair outside the tick-batch boundary, used
    /// by ingestion-time signature verification (§4.F step 6) rather than
    /// the scheduler's commit path. Returns `false` without writing if the
    /// pair was already used (I4); callers serialize calls with a mutex so
    /// this check-then-insert stays atomic from their perspective.
    pub fn record_nonce_if_unused(&self, signer_hex: &str, nonce: u64) -> Result<bool> {
        let key = nonce_key(signer_hex, nonce);
        let txn = self.db.begin_write()?;
        let inserted = {
            let mut table = txn.open_table(NONCES)?;
            if table.get(key.as_str())?.is_some() {
                false
            } else {
                table.insert(key.as_str(), ())?;
                true
            }
        };
        txn.commit()?;
        Ok(inserted)
    }

    /// Iterate all persisted entities, for rebuilding an in-memory `EcsWorld`
    /// snapshot at startup.
    pub fn load_all_entities(&self) -> Result<Vec<(EntityId, EntityRecord)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            let record: EntityRecord = rmp_serde::from_slice(v.value())?;
            out.push((EntityId::from_raw(k.value()), record));
        }
        Ok(out)
    }
}

fn nonce_key(signer_hex: &str, nonce: u64) -> String {
    format!("{signer_hex}:{nonce}")
}

fn apply_op(
    entities: &mut redb::Table<'_, u64, &[u8]>,
    meta: &mut redb::Table<'_, &str, &[u8]>,
    nonces: &mut redb::Table<'_, &str, ()>,
    op: &Op,
) -> Result<()> {
    match op {
        Op::CreateEntity {
            entity,
            archetype,
            components,
        } => {
            let record = EntityRecord {
                archetype: archetype.clone(),
                components: components.clone(),
            };
            entities.insert(entity.get(), rmp_serde::to_vec(&record)?.as_slice())?;
        }
        Op::DestroyEntity { entity } => {
            entities.remove(entity.get())?;
        }
        Op::MoveEntity {
            entity,
            new_archetype,
            components,
        } => {
            let record = EntityRecord {
                archetype: new_archetype.clone(),
                components: components.clone(),
            };
            entities.insert(entity.get(), rmp_serde::to_vec(&record)?.as_slice())?;
        }
        Op::SetComponent {
            entity,
            component,
            bytes,
        } => {
            let mut record: EntityRecord = match entities.get(entity.get())? {
                Some(existing) => rmp_serde::from_slice(existing.value())?,
                None => EntityRecord {
                    archetype: vec![*component],
                    components: Vec::new(),
                },
            };
            if let Some(slot) = record.components.iter_mut().find(|(c, _)| c == component) {
                slot.1 = bytes.clone();
            } else {
                record.components.push((*component, bytes.clone()));
            }
            entities.insert(entity.get(), rmp_serde::to_vec(&record)?.as_slice())?;
        }
        Op::AdvanceNonce { signer_hex, nonce } => {
            nonces.insert(nonce_key(signer_hex, *nonce).as_str(), ())?;
        }
        Op::AdvanceTick => {
            let current = match meta.get(KEY_TICK_COUNTER)? {
                Some(bytes) => u64::from_le_bytes(bytes.value().try_into().expect("8 bytes")),
                None => 0,
            };
            meta.insert(KEY_TICK_COUNTER, (current + 1).to_le_bytes().as_slice())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardinal_ecs::ComponentId;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (store, pending) = Store::open(dir.path().join("test.redb")).unwrap();
        assert!(pending.is_none());
        (store, dir)
    }

    #[test]
    fn begin_append_commit_roundtrip() {
        let (store, _dir) = temp_store();
        store.begin_batch(1).unwrap();
        store
            .append_op(Op::CreateEntity {
                entity: EntityId::from_raw(1),
                archetype: vec![ComponentId(0)],
                components: vec![(ComponentId(0), vec![1, 2, 3])],
            })
            .unwrap();
        store.append_op(Op::AdvanceTick).unwrap();
        store.commit_batch().unwrap();

        assert_eq!(store.current_tick().unwrap(), 1);
        let record = store.load_entity(EntityId::from_raw(1)).unwrap().unwrap();
        assert_eq!(record.components, vec![(ComponentId(0), vec![1, 2, 3])]);
    }

    #[test]
    fn discard_batch_leaves_no_trace() {
        let (store, _dir) = temp_store();
        store.begin_batch(1).unwrap();
        store
            .append_op(Op::CreateEntity {
                entity: EntityId::from_raw(1),
                archetype: vec![ComponentId(0)],
                components: vec![],
            })
            .unwrap();
        store.discard_batch().unwrap();

        assert_eq!(store.current_tick().unwrap(), 0);
        assert!(store.load_entity(EntityId::from_raw(1)).unwrap().is_none());
    }

    #[test]
    fn conflicting_batch_rejected() {
        let (store, _dir) = temp_store();
        store.begin_batch(1).unwrap();
        let err = store.begin_batch(2).unwrap_err();
        assert!(matches!(err, StoreError::BatchConflict { existing: 1, requested: 2 }));
    }

    #[test]
    fn reopen_surfaces_pending_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let (store, _) = Store::open(&path).unwrap();
            store.begin_batch(5).unwrap();
            store.append_op(Op::AdvanceTick).unwrap();
        }
        let (_store, pending) = Store::open(&path).unwrap();
        let pending = pending.unwrap();
        assert_eq!(pending.tick, 5);
        assert_eq!(pending.ops.len(), 1);
    }

    #[test]
    fn nonce_tracking_via_advance_op() {
        let (store, _dir) = temp_store();
        assert!(!store.is_nonce_used("abc", 1).unwrap());
        store.begin_batch(1).unwrap();
        store
            .append_op(Op::AdvanceNonce {
                signer_hex: "abc".to_string(),
                nonce: 1,
            })
            .unwrap();
        store.commit_batch().unwrap();
        assert!(store.is_nonce_used("abc", 1).unwrap());
    }

    #[test]
    fn record_nonce_if_unused_rejects_replay() {
        let (store, _dir) = temp_store();
        assert!(store.record_nonce_if_unused("abc", 1).unwrap());
        assert!(!store.record_nonce_if_unused("abc", 1).unwrap());
        assert!(store.record_nonce_if_unused("abc", 2).unwrap());
    }
}
