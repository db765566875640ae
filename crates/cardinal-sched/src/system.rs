//! The boxed, named, sequentially-ordered systems the scheduler runs.
//!
//! No conflict analysis or staging: the ECB gives every system exclusive
//! access by construction, so registration order is the only order that
//! matters (§4.G).

use crate::context::TickContext;
use crate::error::SystemError;

pub trait System: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, ctx: &mut TickContext<'_>) -> Result<(), SystemError>;
}
