//! API routes

mod health;
pub mod metrics;
mod overrides;

use axum::{Router, http::Uri};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::with_interception;
use crate::state::{AppState, MetricsHandle};

/// Stand-in application handler for anything no route claims
async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

/// Create the router for one listener
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(overrides::routes())
        .with_state(state.clone());

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    // Interception wraps the fallback too, so overrides can target any path
    with_interception(router.fallback(not_found), state)
}
