//! # cardinal-store
//!
//! The durable append-only key-value log underneath the simulation core
//! (§4.A). Built on `redb`; a tick's writes land in a `pending` batch and
//! only become visible to `load_*` readers once `commit_batch` returns.

pub mod error;
pub mod op;
pub mod store;

pub use error::{Result, StoreError};
pub use op::Op;
pub use store::{EntityRecord, PendingBatch, Store};
