//! Ed25519 signing and verification over canonical envelope bytes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{CryptoError, Result};

/// Sign `message` (normally the output of [`crate::canonical_bytes`]) with a
/// keypair. Exposed for tests and tooling that need to produce fixtures —
/// production signing happens client-side, outside this crate.
#[must_use]
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> String {
    hex::encode(signing_key.sign(message).to_bytes())
}

/// Generate a fresh Ed25519 keypair.
#[must_use]
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Verify a hex-encoded signature over `message` against a hex-encoded
/// 32-byte public key.
pub fn verify(public_key_hex: &str, message: &[u8], signature_hex: &str) -> Result<()> {
    let key_bytes = hex::decode(public_key_hex)?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|v: Vec<u8>| CryptoError::InvalidPublicKeyLength(v.len()))?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_array).map_err(|_| CryptoError::MalformedPublicKey)?;

    let sig_bytes = hex::decode(signature_hex)?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|v: Vec<u8>| CryptoError::InvalidSignatureLength(v.len()))?;
    let signature = Signature::from_bytes(&sig_array);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrips() {
        let key = generate_keypair();
        let message = b"transaction payload";
        let sig = sign(&key, message);
        let public_hex = hex::encode(key.verifying_key().as_bytes());
        assert!(verify(&public_hex, message, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = generate_keypair();
        let sig = sign(&key, b"original");
        let public_hex = hex::encode(key.verifying_key().as_bytes());
        assert!(verify(&public_hex, b"tampered", &sig).is_err());
    }

    #[test]
    fn wrong_length_signature_is_rejected_cleanly() {
        let key = generate_keypair();
        let public_hex = hex::encode(key.verifying_key().as_bytes());
        assert!(verify(&public_hex, b"msg", "ab").is_err());
    }
}
