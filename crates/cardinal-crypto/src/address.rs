//! Signer addresses.
//!
//! `signerAddress` is the lower-case hex encoding of the low 20 bytes of
//! SHA-256(public key) — the same 20-byte hex shape used throughout the
//! wire schemas (persona claims, signer-query replies).

use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

pub const ADDRESS_LEN: usize = 20;

/// Derive the hex signer address for an Ed25519 public key.
#[must_use]
pub fn address_from_public_key(public_key: &[u8; 32]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[digest.len() - ADDRESS_LEN..])
}

/// Validate that a string is a well-formed 20-byte hex address, returning
/// the lower-cased canonical form.
pub fn validate_address(address: &str) -> Result<String> {
    let bytes = hex::decode(address)?;
    if bytes.len() != ADDRESS_LEN {
        return Err(CryptoError::InvalidAddressLength(bytes.len()));
    }
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn address_is_20_bytes_hex() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let address = address_from_public_key(signing_key.verifying_key().as_bytes());
        assert_eq!(address.len(), ADDRESS_LEN * 2);
        assert!(hex::decode(&address).is_ok());
    }

    #[test]
    fn validate_rejects_wrong_length() {
        assert!(validate_address("abcd").is_err());
    }

    #[test]
    fn validate_lowercases_input() {
        let addr = validate_address(&"AB".repeat(ADDRESS_LEN)).unwrap();
        assert_eq!(addr, "ab".repeat(ADDRESS_LEN));
    }
}
