//! Receipt history: a fixed-size ring buffer keyed by tick (§4.H).
//!
//! Each slot holds the receipts produced by one tick. The ring keeps the
//! most recent `capacity` ticks; once full, committing a new tick evicts the
//! oldest.

use std::collections::VecDeque;

use cardinal_crypto::TxHash;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub tick: u64,
    pub result: Option<serde_json::Value>,
    pub errors: Vec<String>,
}

struct Slot {
    tick: u64,
    receipts: Vec<Receipt>,
}

/// A window of receipts: `[start_tick, end_tick)` plus the receipts it
/// contains, in tick order.
#[derive(Debug, Clone, Default)]
pub struct ReceiptWindow {
    pub start_tick: u64,
    pub end_tick: u64,
    pub receipts: Vec<Receipt>,
}

pub struct ReceiptHistory {
    capacity: usize,
    slots: VecDeque<Slot>,
}

impl ReceiptHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "receipt history capacity must be non-zero");
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    /// Record the receipts produced by `tick`, evicting the oldest slot if
    /// the ring is at capacity.
    pub fn push(&mut self, tick: u64, receipts: Vec<Receipt>) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(Slot { tick, receipts });
    }

    #[must_use]
    pub fn current_tick(&self) -> Option<u64> {
        self.slots.back().map(|s| s.tick)
    }

    /// The largest `[startTick, endTick)` window contained in the ring with
    /// `startTick >= start`. If `start` is beyond the newest retained tick,
    /// the window is empty and collapses to `[currentTick, currentTick)`.
    #[must_use]
    pub fn window_since(&self, start: u64) -> ReceiptWindow {
        let Some(current) = self.current_tick() else {
            return ReceiptWindow {
                start_tick: 0,
                end_tick: 0,
                receipts: Vec::new(),
            };
        };

        if start > current {
            return ReceiptWindow {
                start_tick: current,
                end_tick: current,
                receipts: Vec::new(),
            };
        }

        let oldest = self.slots.front().map(|s| s.tick).unwrap_or(current);
        let effective_start = start.max(oldest);

        let mut receipts = Vec::new();
        for slot in &self.slots {
            if slot.tick >= effective_start {
                receipts.extend(slot.receipts.iter().cloned());
            }
        }

        ReceiptWindow {
            start_tick: effective_start,
            end_tick: current + 1,
            receipts,
        }
    }
}
