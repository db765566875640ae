//! Canonical encoding of transaction envelopes for hashing and signing.
//!
//! Both `TxHash` and signature verification operate over the same byte
//! string: the envelope's JSON object with its `signature` field elided.
//! `serde_json::Map` is backed by a `BTreeMap` in this build (the
//! `preserve_order` feature is not enabled), so `serde_json::to_vec` already
//! emits object keys in sorted order — that ordering, not any bespoke
//! encoder, is what makes this "canonical".

use serde_json::Value;

use crate::error::{CryptoError, Result};

/// Serialise `envelope` to canonical bytes with the `signature` field
/// removed. `envelope` must be a JSON object.
pub fn canonical_bytes(envelope: &Value) -> Result<Vec<u8>> {
    let mut object = envelope.as_object().cloned().ok_or(CryptoError::NotAnObject)?;
    object.remove("signature");
    Ok(serde_json::to_vec(&object)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signature_field_is_elided() {
        let envelope = json!({"nonce": 1, "signature": "deadbeef", "namespace": "ns"});
        let bytes = canonical_bytes(&envelope).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("signature"));
    }

    #[test]
    fn key_order_is_sorted_regardless_of_input_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }
}
