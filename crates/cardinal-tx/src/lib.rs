//! # cardinal-tx
//!
//! Message type registration, the transaction ingestion queue, the built-in
//! persona/signer component, and the signature-verification pipeline that
//! composes `cardinal-crypto` primitives with ECS persona lookups and the
//! durable nonce set (§4.D, §4.E, §4.F).

pub mod envelope;
pub mod message;
pub mod persona;
pub mod queue;
pub mod verifier;

pub use envelope::Envelope;
pub use message::{MessageMeta, MessageRegistry, MessageRegistryError, MessageTypeId};
pub use persona::{PersonaComponent, PersonaIndex, PERSONA_COMPONENT_NAME};
pub use queue::{QueuedTx, TxQueue};
pub use verifier::{VerifiedIdentity, Verifier, VerifyError};
