//! Message type registration (§4.D).
//!
//! One-shot, name-keyed, exactly like `cardinal_ecs::ComponentRegistry` —
//! registration happens at startup, before any transaction is accepted.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MessageTypeId(pub u32);

#[derive(Debug, thiserror::Error)]
pub enum MessageRegistryError {
    #[error("message type `{0}` is already registered")]
    DuplicateName(String),
    #[error("message registration attempted after startup")]
    RegistrationClosed,
    #[error("unknown message type `{0}`")]
    UnknownMessage(String),
}

/// Metadata for one registered message type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageMeta {
    pub id: MessageTypeId,
    pub name: String,
    pub request_shape: String,
    pub result_shape: String,
    pub evm_support: bool,
}

#[derive(Debug, Default)]
pub struct MessageRegistry {
    by_name: HashMap<String, MessageTypeId>,
    metas: Vec<MessageMeta>,
    sealed: bool,
}

impl MessageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        request_shape: impl Into<String>,
        result_shape: impl Into<String>,
        evm_support: bool,
    ) -> Result<MessageTypeId, MessageRegistryError> {
        if self.sealed {
            return Err(MessageRegistryError::RegistrationClosed);
        }
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(MessageRegistryError::DuplicateName(name));
        }
        let id = MessageTypeId(self.metas.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.metas.push(MessageMeta {
            id,
            name,
            request_shape: request_shape.into(),
            result_shape: result_shape.into(),
            evm_support,
        });
        Ok(id)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn id_by_name(&self, name: &str) -> Result<MessageTypeId, MessageRegistryError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| MessageRegistryError::UnknownMessage(name.to_string()))
    }

    #[must_use]
    pub fn meta(&self, id: MessageTypeId) -> Option<&MessageMeta> {
        self.metas.get(id.0 as usize)
    }

    #[must_use]
    pub fn all(&self) -> &[MessageMeta] {
        &self.metas
    }
}
