//! Registered game query handlers for `POST /query/game/{name}` — run
//! synchronously against the last-committed snapshot.

use std::collections::HashMap;

use cardinal_ecs::{ComponentRegistry, EcsWorld};
use serde_json::Value;

use crate::error::ApiError;

pub trait QueryHandler: Send + Sync {
    fn call(&self, world: &EcsWorld, registry: &ComponentRegistry, body: Value) -> Result<Value, ApiError>;
}

impl<F> QueryHandler for F
where
    F: Fn(&EcsWorld, &ComponentRegistry, Value) -> Result<Value, ApiError> + Send + Sync,
{
    fn call(&self, world: &EcsWorld, registry: &ComponentRegistry, body: Value) -> Result<Value, ApiError> {
        self(world, registry, body)
    }
}

#[derive(Default)]
pub struct QueryRegistry {
    handlers: HashMap<String, Box<dyn QueryHandler>>,
}

impl QueryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: impl QueryHandler + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn QueryHandler> {
        self.handlers.get(name).map(|b| b.as_ref())
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
