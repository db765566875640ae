//! # cardinal-crypto
//!
//! Canonical envelope encoding, Ed25519 signing/verification, signer address
//! derivation, and transaction hashing (§4.F). Pure cryptographic
//! primitives only — persona lookup and nonce bookkeeping live in
//! `cardinal-tx`, which composes these into the full verification pipeline.

pub mod address;
pub mod canonical;
pub mod error;
pub mod signature;
pub mod tx_hash;

pub use address::{address_from_public_key, validate_address};
pub use canonical::canonical_bytes;
pub use error::{CryptoError, Result};
pub use signature::{generate_keypair, sign, verify};
pub use tx_hash::TxHash;
