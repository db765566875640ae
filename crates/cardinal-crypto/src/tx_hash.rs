//! Deterministic transaction hashing.

use sha2::{Digest, Sha256};

/// Digest of a transaction envelope's canonical bytes, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    #[must_use]
    pub fn from_canonical_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_hash_identically() {
        let a = TxHash::from_canonical_bytes(b"payload");
        let b = TxHash::from_canonical_bytes(b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_differently() {
        let a = TxHash::from_canonical_bytes(b"payload-a");
        let b = TxHash::from_canonical_bytes(b"payload-b");
        assert_ne!(a, b);
    }
}
