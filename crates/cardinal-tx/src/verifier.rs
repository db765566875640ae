//! The signature-verification pipeline (§4.F).
//!
//! Composes `cardinal_crypto`'s pure primitives with a `PersonaIndex`
//! lookup and the Store's nonce table. The envelope's top-level shape
//! (`personaTag`/`namespace`/`nonce`/`signature`/`body`) carries no public
//! key field, so verification needs one more piece of information than the
//! documented wire shape names: every `body` additionally carries a
//! `publicKey` (hex Ed25519 key), and the signer address bound to a persona
//! is checked against `address_from_public_key(publicKey)` before the
//! signature itself is verified. This is recorded as an open-question
//! resolution rather than a silent addition.

use std::sync::Mutex;

use cardinal_crypto::{address_from_public_key, verify as verify_signature, CryptoError};
use cardinal_store::Store;

use crate::envelope::Envelope;
use crate::persona::PersonaIndex;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("missing persona tag")]
    MissingPersonaTag,
    #[error("envelope namespace does not match world namespace")]
    WrongNamespace,
    #[error("system-transaction flag did not match expectation")]
    SystemFlagMismatch,
    #[error("unknown persona tag")]
    UnknownPersonaTag,
    #[error("signature verification failed")]
    BadSignature,
    #[error("nonce already used for this signer")]
    NonceReused,
    #[error("storage error: {0}")]
    Storage(#[from] cardinal_store::StoreError),
}

impl From<CryptoError> for VerifyError {
    fn from(_: CryptoError) -> Self {
        VerifyError::BadSignature
    }
}

/// The outcome of a successful verification: who the scheduler should
/// attribute this transaction to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub signer_address: String,
}

pub struct Verifier {
    namespace: String,
    signatures_enabled: bool,
    store: Store,
    nonce_write_lock: Mutex<()>,
}

impl Verifier {
    #[must_use]
    pub fn new(namespace: String, signatures_enabled: bool, store: Store) -> Self {
        Self {
            namespace,
            signatures_enabled,
            store,
            nonce_write_lock: Mutex::new(()),
        }
    }

    /// Run the full pipeline described in §4.F against `envelope`.
    pub fn verify(
        &self,
        envelope: &Envelope,
        expect_system: bool,
        personas: &PersonaIndex,
    ) -> Result<VerifiedIdentity, VerifyError> {
        if !self.signatures_enabled {
            return Ok(VerifiedIdentity {
                signer_address: "0".repeat(40),
            });
        }

        if !expect_system
            && envelope
                .persona_tag
                .as_deref()
                .map(str::is_empty)
                .unwrap_or(true)
        {
            return Err(VerifyError::MissingPersonaTag);
        }
        if envelope.namespace != self.namespace {
            return Err(VerifyError::WrongNamespace);
        }
        if envelope.is_system() != expect_system {
            return Err(VerifyError::SystemFlagMismatch);
        }

        let (signer_address, public_key) = if expect_system {
            let signer_address = envelope
                .body
                .get("signerAddress")
                .and_then(|v| v.as_str())
                .ok_or(VerifyError::BadSignature)?
                .to_string();
            let public_key = envelope
                .body
                .get("publicKey")
                .and_then(|v| v.as_str())
                .ok_or(VerifyError::BadSignature)?
                .to_string();
            (signer_address, public_key)
        } else {
            let tag = envelope.persona_tag.as_deref().expect("checked above");
            let (_, signer_address, public_key) =
                personas.resolve(tag).ok_or(VerifyError::UnknownPersonaTag)?;
            (signer_address.clone(), public_key.clone())
        };

        let public_key_bytes: [u8; 32] = hex::decode(&public_key)
            .map_err(|_| VerifyError::BadSignature)?
            .try_into()
            .map_err(|_: Vec<u8>| VerifyError::BadSignature)?;
        if address_from_public_key(&public_key_bytes) != signer_address {
            return Err(VerifyError::BadSignature);
        }

        let message = envelope.canonical_bytes()?;
        verify_signature(&public_key, &message, &envelope.signature)?;

        let inserted = {
            let _guard = self.nonce_write_lock.lock().expect("nonce lock poisoned");
            self.store.record_nonce_if_unused(&signer_address, envelope.nonce)?
        };
        if !inserted {
            return Err(VerifyError::NonceReused);
        }

        Ok(VerifiedIdentity { signer_address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardinal_crypto::{generate_keypair, sign};
    use serde_json::json;
    use tempfile::tempdir;

    fn store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let (store, _) = Store::open(dir.path().join("v.redb")).unwrap();
        (store, dir)
    }

    fn system_envelope(namespace: &str, nonce: u64) -> (Envelope, cardinal_crypto::TxHash) {
        let key = generate_keypair();
        signed_envelope_with_key(&key, namespace, nonce)
    }

    fn signed_envelope_with_key(
        key: &ed25519_dalek::SigningKey,
        namespace: &str,
        nonce: u64,
    ) -> (Envelope, cardinal_crypto::TxHash) {
        let public_key = hex::encode(key.verifying_key().as_bytes());
        let signer_address = address_from_public_key(key.verifying_key().as_bytes());
        let mut envelope = Envelope {
            persona_tag: None,
            namespace: namespace.to_string(),
            nonce,
            signature: String::new(),
            body: json!({"signerAddress": signer_address, "publicKey": public_key, "personaTag": "CoolMage"}),
        };
        let message = envelope.canonical_bytes().unwrap();
        envelope.signature = sign(key, &message);
        let hash = envelope.tx_hash().unwrap();
        (envelope, hash)
    }

    #[test]
    fn accepts_well_formed_system_transaction() {
        let (store, _dir) = store();
        let verifier = Verifier::new("ns".to_string(), true, store);
        let (envelope, _) = system_envelope("ns", 1);
        let personas = PersonaIndex::default();
        assert!(verifier.verify(&envelope, true, &personas).is_ok());
    }

    #[test]
    fn rejects_wrong_namespace() {
        let (store, _dir) = store();
        let verifier = Verifier::new("ns".to_string(), true, store);
        let (envelope, _) = system_envelope("other-ns", 1);
        let personas = PersonaIndex::default();
        assert!(matches!(
            verifier.verify(&envelope, true, &personas),
            Err(VerifyError::WrongNamespace)
        ));
    }

    #[test]
    fn rejects_nonce_replay() {
        let (store, _dir) = store();
        let verifier = Verifier::new("ns".to_string(), true, store);
        let (envelope, _) = system_envelope("ns", 42);
        let personas = PersonaIndex::default();
        assert!(verifier.verify(&envelope, true, &personas).is_ok());
        assert!(matches!(
            verifier.verify(&envelope, true, &personas),
            Err(VerifyError::NonceReused)
        ));
    }

    #[test]
    fn out_of_order_lower_nonce_from_same_signer_is_accepted() {
        let (store, _dir) = store();
        let verifier = Verifier::new("ns".to_string(), true, store);
        let key = generate_keypair();
        let personas = PersonaIndex::default();
        let (high, _) = signed_envelope_with_key(&key, "ns", 101);
        assert!(verifier.verify(&high, true, &personas).is_ok());
        let (low, _) = signed_envelope_with_key(&key, "ns", 99);
        assert!(verifier.verify(&low, true, &personas).is_ok());
    }

    #[test]
    fn dev_mode_bypasses_verification_entirely() {
        let (store, _dir) = store();
        let verifier = Verifier::new("ns".to_string(), false, store);
        let envelope = Envelope {
            persona_tag: None,
            namespace: "wrong".to_string(),
            nonce: 1,
            signature: String::new(),
            body: json!({}),
        };
        assert!(verifier.verify(&envelope, true, &PersonaIndex::default()).is_ok());
    }
}
