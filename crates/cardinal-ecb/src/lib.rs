//! # cardinal-ecb
//!
//! The per-tick entity-command buffer that every system reads and writes
//! through (§4.B). Wraps a committed [`cardinal_ecs::EcsWorld`] snapshot and
//! turns writes into the op log the durable log (§4.A) ultimately commits.

pub mod ecb;

pub use ecb::{Ecb, ReadOnlyEcb};
