//! Per-tick context handed to systems (§4.G).

use std::collections::HashMap;
use std::time::SystemTime;

use cardinal_crypto::TxHash;
use cardinal_ecb::Ecb;
use cardinal_tx::{MessageTypeId, PersonaIndex, QueuedTx};
use serde_json::Value;

/// The accumulated result/errors for one drained transaction, last-writer-
/// wins on the result, append-only on errors.
#[derive(Debug, Default, Clone)]
pub struct ReceiptOutcome {
    pub result: Option<Value>,
    pub errors: Vec<String>,
}

pub struct TickContext<'a> {
    pub tick: u64,
    pub started_at: SystemTime,
    pub ecb: &'a mut Ecb,
    pub persona: &'a PersonaIndex,
    drained: &'a HashMap<MessageTypeId, Vec<QueuedTx>>,
    outcomes: &'a mut HashMap<TxHash, ReceiptOutcome>,
}

impl<'a> TickContext<'a> {
    #[must_use]
    pub fn new(
        tick: u64,
        started_at: SystemTime,
        ecb: &'a mut Ecb,
        persona: &'a PersonaIndex,
        drained: &'a HashMap<MessageTypeId, Vec<QueuedTx>>,
        outcomes: &'a mut HashMap<TxHash, ReceiptOutcome>,
    ) -> Self {
        Self {
            tick,
            started_at,
            ecb,
            persona,
            drained,
            outcomes,
        }
    }

    #[must_use]
    pub fn drained_for(&self, msg_type: MessageTypeId) -> &[QueuedTx] {
        self.drained.get(&msg_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Last writer wins for a given transaction's result.
    pub fn set_result(&mut self, hash: &TxHash, value: Value) {
        self.outcomes.entry(hash.clone()).or_default().result = Some(value);
    }

    /// Errors accumulate; they never replace a previously set result.
    pub fn add_error(&mut self, hash: &TxHash, err: impl Into<String>) {
        self.outcomes.entry(hash.clone()).or_default().errors.push(err.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardinal_ecs::EcsWorld;

    #[test]
    fn set_result_is_last_writer_wins() {
        let mut ecb = Ecb::new(EcsWorld::new());
        let persona = PersonaIndex::default();
        let drained = HashMap::new();
        let mut outcomes = HashMap::new();
        let hash = TxHash("abc".to_string());
        {
            let mut ctx = TickContext::new(1, SystemTime::now(), &mut ecb, &persona, &drained, &mut outcomes);
            ctx.set_result(&hash, serde_json::json!({"a": 1}));
            ctx.set_result(&hash, serde_json::json!({"a": 2}));
        }
        assert_eq!(outcomes[&hash].result, Some(serde_json::json!({"a": 2})));
    }

    #[test]
    fn add_error_accumulates() {
        let mut ecb = Ecb::new(EcsWorld::new());
        let persona = PersonaIndex::default();
        let drained = HashMap::new();
        let mut outcomes = HashMap::new();
        let hash = TxHash("abc".to_string());
        {
            let mut ctx = TickContext::new(1, SystemTime::now(), &mut ecb, &persona, &drained, &mut outcomes);
            ctx.add_error(&hash, "first");
            ctx.add_error(&hash, "second");
        }
        assert_eq!(outcomes[&hash].errors, vec!["first".to_string(), "second".to_string()]);
    }
}
