//! The transaction ingestion queue (§4.E).
//!
//! A single consumer — the scheduler, at tick boundaries — drains everything
//! producers have enqueued since the last drain. Producers never block on a
//! tick in progress: while a drain is underway, new arrivals land in a
//! `next` buffer that becomes `current` once the drain completes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::envelope::Envelope;
use crate::message::MessageTypeId;

/// One accepted transaction, already verified, waiting to be run.
#[derive(Debug, Clone)]
pub struct QueuedTx {
    pub msg_type: MessageTypeId,
    pub envelope: Envelope,
    pub value: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct TxQueue {
    current: Mutex<Vec<QueuedTx>>,
    next: Mutex<Vec<QueuedTx>>,
    draining: AtomicBool,
}

impl TxQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an already-verified transaction.
    pub fn add_transaction(&self, tx: QueuedTx) {
        if self.draining.load(Ordering::Acquire) {
            self.next.lock().expect("tx queue poisoned").push(tx);
        } else {
            self.current.lock().expect("tx queue poisoned").push(tx);
        }
    }

    /// Atomically snapshot and clear the current buffer, grouped by message
    /// type, then swap the next-tick buffer into place.
    pub fn drain(&self) -> HashMap<MessageTypeId, Vec<QueuedTx>> {
        self.draining.store(true, Ordering::Release);
        let drained = std::mem::take(&mut *self.current.lock().expect("tx queue poisoned"));
        {
            let mut current = self.current.lock().expect("tx queue poisoned");
            let mut next = self.next.lock().expect("tx queue poisoned");
            *current = std::mem::take(&mut *next);
        }
        self.draining.store(false, Ordering::Release);

        let mut grouped: HashMap<MessageTypeId, Vec<QueuedTx>> = HashMap::new();
        for tx in drained {
            grouped.entry(tx.msg_type).or_default().push(tx);
        }
        grouped
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.current.lock().expect("tx queue poisoned").len()
    }

    /// Non-destructive snapshot of everything currently queued (not yet
    /// drained), for status queries that need to see in-flight submissions.
    #[must_use]
    pub fn peek_current(&self) -> Vec<QueuedTx> {
        self.current.lock().expect("tx queue poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(msg_type: u32, nonce: u64) -> QueuedTx {
        QueuedTx {
            msg_type: MessageTypeId(msg_type),
            envelope: Envelope {
                persona_tag: Some("Tag".to_string()),
                namespace: "ns".to_string(),
                nonce,
                signature: "deadbeef".to_string(),
                body: json!({}),
            },
            value: json!({}),
        }
    }

    #[test]
    fn drain_groups_by_message_type_and_clears_queue() {
        let queue = TxQueue::new();
        queue.add_transaction(tx(0, 1));
        queue.add_transaction(tx(1, 2));
        queue.add_transaction(tx(0, 3));

        let grouped = queue.drain();
        assert_eq!(grouped[&MessageTypeId(0)].len(), 2);
        assert_eq!(grouped[&MessageTypeId(1)].len(), 1);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn drain_on_empty_queue_yields_no_groups() {
        let queue = TxQueue::new();
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn transactions_added_after_drain_are_visible_next_drain() {
        let queue = TxQueue::new();
        queue.add_transaction(tx(0, 1));
        let _ = queue.drain();
        queue.add_transaction(tx(0, 2));
        let grouped = queue.drain();
        assert_eq!(grouped[&MessageTypeId(0)].len(), 1);
    }
}
