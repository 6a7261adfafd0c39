//! HandlerRegistry - action name -> handler.
//!
//! Built during initialization (mutable), then shared read-only behind an
//! `Arc` while the engine runs, so lookups need no lock.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::ActionHandler;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for action '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        action: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), RegistryError> {
        let action = action.into();
        if self.handlers.contains_key(&action) {
            return Err(RegistryError::AlreadyRegistered(action));
        }
        self.handlers.insert(action, handler);
        Ok(())
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action).cloned()
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names, sorted.
    pub fn registered_actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self.handlers.keys().cloned().collect();
        actions.sort();
        actions
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.registered_actions())
            .finish()
    }
}
