//! The cheaply-cloned handle every route handler shares (§4.I, §5).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cardinal_sched::Scheduler;
use cardinal_tx::{MessageRegistry, TxQueue, Verifier};
use tokio::sync::RwLock;

use crate::query_registry::QueryRegistry;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<RwLock<Scheduler>>,
    pub tx_queue: Arc<TxQueue>,
    pub verifier: Arc<Verifier>,
    pub message_registry: Arc<MessageRegistry>,
    pub query_registry: Arc<QueryRegistry>,
    pub namespace: String,
    pub debug: bool,
    pub enable_allowlist: bool,
    /// Signer addresses pre-registered to claim a persona. Empty by default
    /// since the wire surface exposes no registration endpoint for it —
    /// operators seed it out of band.
    pub allowlist: Arc<RwLock<HashSet<String>>>,
    pub recovering: Arc<AtomicBool>,
    pub game_loop_running: Arc<AtomicBool>,
}

impl AppState {
    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.recovering.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_game_loop_running(&self) -> bool {
        self.game_loop_running.load(Ordering::Acquire)
    }

    pub fn set_recovering(&self, value: bool) {
        self.recovering.store(value, Ordering::Release);
    }

    pub fn set_game_loop_running(&self, value: bool) {
        self.game_loop_running.store(value, Ordering::Release);
    }
}
