//! The HTTP edge: transaction ingestion, query handlers, receipts, and the
//! event WebSocket (§4.I).

mod error;
mod query_registry;
mod response;
mod routes;
mod state;

pub use error::ApiError;
pub use query_registry::{QueryHandler, QueryRegistry};
pub use response::ApiResponse;
pub use routes::{router, CREATE_PERSONA_MESSAGE};
pub use state::AppState;
