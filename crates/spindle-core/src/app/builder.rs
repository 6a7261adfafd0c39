//! EngineBuilder - wiring and startup validation.
//!
//! Collects handlers, collaborators and ports, then checks at `build()` that
//! every action the caller expects has a handler, so a misconfigured engine
//! fails at startup instead of on the first step that needs the action.

use std::sync::Arc;

use super::manager::{Parts, TaskManager};
use crate::config::EngineConfig;
use crate::handlers::{ActionHandler, Collaborators, HandlerRegistry, RegistryError, register_builtins};
use crate::impls::NoopTaskStore;
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

/// # Example
/// ```ignore
/// let manager = EngineBuilder::new()
///     .collaborators(Collaborators::new().with_notifier(Arc::new(TracingNotifier)))
///     .register("resize_image", Arc::new(ResizeImage))?
///     .expect_actions(&["send_notification", "resize_image"])
///     .build()?;
/// ```
pub struct EngineBuilder {
    registry: HandlerRegistry,
    collaborators: Option<Collaborators>,
    expected_actions: Option<Vec<String>>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    store: Arc<dyn TaskStore>,
    config: EngineConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing actions: {0:?}. These actions were expected but have no handler.")]
    MissingActions(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            collaborators: None,
            expected_actions: None,
            clock: Arc::new(SystemClock),
            ids: None,
            store: Arc::new(NoopTaskStore),
            config: EngineConfig::default(),
        }
    }

    pub fn register(
        mut self,
        action: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<Self, RegistryError> {
        self.registry.register(action, handler)?;
        Ok(self)
    }

    /// Register the built-in actions backed by these collaborators.
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    pub fn expect_actions(mut self, actions: &[&str]) -> Self {
        self.expected_actions = Some(actions.iter().map(|a| a.to_string()).collect());
        self
    }

    /// Timestamp source. Also stamps generated ids unless `id_generator`
    /// is given.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<TaskManager, BuildError> {
        let mut registry = self.registry;
        if let Some(collaborators) = &self.collaborators {
            register_builtins(&mut registry, collaborators)?;
        }

        if let Some(expected) = &self.expected_actions {
            let missing: Vec<String> = expected
                .iter()
                .filter(|action| !registry.contains(action))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingActions(missing));
            }
        }

        let ids = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&self.clock))),
        };
        Ok(TaskManager::from_parts(Parts {
            registry: Arc::new(registry),
            store: self.store,
            clock: self.clock,
            ids,
            defaults: self.config.spec_defaults(),
            retry: self.config.retry_policy(),
            auto_run: self.config.auto_run,
        }))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
