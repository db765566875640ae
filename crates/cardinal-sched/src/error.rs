#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    #[error("storage error: {0}")]
    Store(#[from] cardinal_store::StoreError),
    #[error("persona index rebuild failed: {0}")]
    Persona(#[from] cardinal_ecs::RegistryError),
    #[error("system `{0}` failed: {1}")]
    System(String, SystemError),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SystemError(pub String);

impl SystemError {
    #[must_use]
    pub fn msg(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

pub type Result<T> = std::result::Result<T, SchedError>;
