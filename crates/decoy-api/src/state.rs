//! Application state

use decoy_core::{Dispatcher, Registry};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus handle used by the metrics endpoint
pub type MetricsHandle = PrometheusHandle;

/// State for one listener
#[derive(Clone)]
pub struct AppState {
    /// Listener name, reported by the listing endpoint
    pub context: String,
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher>,
    /// Whether requests on this listener go through the dispatcher
    pub intercept: bool,
}

impl AppState {
    pub fn new(context: impl Into<String>, registry: Arc<Registry>, intercept: bool) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
        Self {
            context: context.into(),
            registry,
            dispatcher,
            intercept,
        }
    }
}
