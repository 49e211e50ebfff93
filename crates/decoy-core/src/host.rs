//! Multi-context registration
//!
//! A process may serve several intercepting contexts (listeners). Each gets
//! its own [`Registry`]; registering through the host installs the same
//! override into all of them under one id.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::registry::{OverrideId, OverrideSpec, Registry};

/// Owner of the registries for every intercepting context
#[derive(Default)]
pub struct OverrideHost {
    contexts: RwLock<Vec<(String, Arc<Registry>)>>,
}

impl OverrideHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable interception for a named context and return its registry.
    ///
    /// Attaching the same name twice returns the existing registry.
    pub fn attach(&self, name: impl Into<String>) -> Arc<Registry> {
        let name = name.into();
        let mut contexts = self.contexts.write();

        if let Some((_, registry)) = contexts.iter().find(|(n, _)| *n == name) {
            debug!("Context '{}' already intercepting", name);
            return registry.clone();
        }

        let registry = Arc::new(Registry::new());
        info!("Interception enabled for context '{}'", name);
        contexts.push((name, registry.clone()));
        registry
    }

    /// Names and registries of every attached context, in attach order
    pub fn contexts(&self) -> Vec<(String, Arc<Registry>)> {
        self.contexts.read().clone()
    }

    pub fn registry(&self, name: &str) -> Option<Arc<Registry>> {
        self.contexts
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, registry)| registry.clone())
    }

    /// Validate once and install into every attached context
    pub fn register(&self, spec: OverrideSpec) -> Result<OverrideId, CoreError> {
        let contexts = self.contexts.read();
        if contexts.is_empty() {
            return Err(CoreError::Precondition(
                "cannot register overrides without any intercepting context".to_string(),
            ));
        }

        let validated = spec.validate()?;
        let id = OverrideId::new();
        for (name, registry) in contexts.iter() {
            debug!("Installing override {} into context '{}'", id, name);
            registry.install(id, &validated);
        }
        Ok(id)
    }
}
