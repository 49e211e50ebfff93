//! Prometheus scrape endpoint
//!
//! Only mounted when the binary installed a recorder; counters recorded by
//! the dispatcher and registry show up here.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;

use crate::state::MetricsHandle;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Router serving `GET /metrics` from the given recorder
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(handle)
}

async fn scrape(State(recorder): State<Arc<MetricsHandle>>) -> Response {
    let exposition = recorder.render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        exposition,
    )
        .into_response()
}
