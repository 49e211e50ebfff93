//! Decoy HTTP layer
//!
//! Axum glue for the override engine: the interception middleware, the
//! per-listener state and the small set of built-in routes.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use middleware::{intercept_middleware, with_interception};
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
