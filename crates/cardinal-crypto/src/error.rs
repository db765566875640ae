//! Cryptographic primitive errors.

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("public key must be 32 bytes, got {0}")]
    InvalidPublicKeyLength(usize),
    #[error("signature must be 64 bytes, got {0}")]
    InvalidSignatureLength(usize),
    #[error("signer address must decode to 20 bytes, got {0}")]
    InvalidAddressLength(usize),
    #[error("malformed public key bytes")]
    MalformedPublicKey,
    #[error("malformed signature bytes")]
    MalformedSignature,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("failed to canonicalise envelope: {0}")]
    Canonicalize(#[from] serde_json::Error),
    #[error("envelope is not a JSON object")]
    NotAnObject,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
