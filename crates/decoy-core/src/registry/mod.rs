//! Override registry
//!
//! A [`Registry`] owns the route table for one context. Registration
//! validates a spec, then installs one entry per virtual host; lookups are
//! delegated to the [`OverrideRouter`] behind it.

mod entry;
mod spec;

use std::sync::Arc;

use tracing::info;

use crate::error::{CoreError, RouteError};
use crate::routing::{OverrideRouter, RouteMatch, RouteTable};

pub use entry::{
    ActivationPolicy, OverrideEntry, OverrideId, OverrideSummary, PolicyKind, ResponseSpec,
    StaticResponse,
};
pub use spec::{
    HandlerSpec, OverrideSpec, StaticHandlerSpec, ValidatedOverride, VirtualHosts,
    is_method_token, is_valid_hostname,
};

/// Override storage for a single context
pub struct Registry {
    router: Arc<dyn OverrideRouter>,
}

impl Registry {
    /// Create a registry backed by an empty [`RouteTable`]
    pub fn new() -> Self {
        Self::with_router(Arc::new(RouteTable::new()))
    }

    /// Create a registry over a custom router
    pub fn with_router(router: Arc<dyn OverrideRouter>) -> Self {
        Self { router }
    }

    /// Validate and install an override.
    ///
    /// Nothing is installed unless the whole spec is valid.
    pub fn register(&self, spec: OverrideSpec) -> Result<OverrideId, CoreError> {
        let validated = spec.validate()?;
        let id = OverrideId::new();
        self.install(id, &validated);
        Ok(id)
    }

    /// Install an already validated override under the given id
    pub fn install(&self, id: OverrideId, validated: &ValidatedOverride) {
        for host in &validated.hosts {
            let entry = OverrideEntry::new(
                id,
                validated.method.clone(),
                validated.pattern.clone(),
                host.clone(),
                validated.response.clone(),
                validated.policy.clone(),
            );
            self.router.insert(Arc::new(entry));
        }

        metrics::counter!("decoy_overrides_registered_total").increment(1);

        info!(
            "Registered override {}: {} {} (hosts: {}, policy: {})",
            id,
            validated.method,
            validated.pattern,
            validated.hosts.join(","),
            validated.policy.kind().as_str()
        );
    }

    /// Find the entry that should handle a request
    pub fn resolve(
        &self,
        method: &str,
        path: &str,
        host: Option<&str>,
    ) -> Result<Option<RouteMatch>, RouteError> {
        self.router.resolve(method, path, host)
    }

    /// Snapshots of every entry in insertion order
    pub fn entries(&self) -> Vec<OverrideSummary> {
        self.router.entries().iter().map(|e| e.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.router.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
