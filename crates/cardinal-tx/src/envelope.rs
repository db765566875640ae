//! The wire shape of a signed transaction (§6, §4.F).

use cardinal_crypto::{canonical_bytes, CryptoError, TxHash};
use serde::{Deserialize, Serialize};

/// A transaction envelope as received over HTTP, before verification.
///
/// `persona_tag` is absent for system transactions, which instead carry
/// `signerAddress` inside `body`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "personaTag", skip_serializing_if = "Option::is_none")]
    pub persona_tag: Option<String>,
    pub namespace: String,
    pub nonce: u64,
    pub signature: String,
    pub body: serde_json::Value,
}

impl Envelope {
    /// True when this envelope carries no persona-tag binding — the signer
    /// identity is read straight from `body` instead.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.persona_tag.is_none()
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let value = serde_json::to_value(self).map_err(CryptoError::Canonicalize)?;
        canonical_bytes(&value)
    }

    pub fn tx_hash(&self) -> Result<TxHash, CryptoError> {
        Ok(TxHash::from_canonical_bytes(&self.canonical_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn persona_tag_omitted_for_system_envelope() {
        let envelope = Envelope {
            persona_tag: None,
            namespace: "ns".to_string(),
            nonce: 1,
            signature: "deadbeef".to_string(),
            body: json!({"signerAddress": "aa".repeat(20)}),
        };
        assert!(envelope.is_system());
        let bytes = envelope.canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("personaTag"));
        assert!(!text.contains("signature"));
    }

    #[test]
    fn tx_hash_is_stable_for_identical_envelopes() {
        let envelope = Envelope {
            persona_tag: Some("CoolMage".to_string()),
            namespace: "ns".to_string(),
            nonce: 100,
            signature: "deadbeef".to_string(),
            body: json!({"personaTag": "CoolMage", "signerAddress": "ab".repeat(20)}),
        };
        assert_eq!(envelope.tx_hash().unwrap(), envelope.clone().tx_hash().unwrap());
    }
}
