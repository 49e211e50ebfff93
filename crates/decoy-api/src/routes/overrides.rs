//! Override listing

use axum::{Json, Router, extract::State, routing::get};
use decoy_core::OverrideSummary;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct OverrideListResponse {
    pub context: String,
    pub intercept: bool,
    pub total: usize,
    pub overrides: Vec<OverrideSummary>,
}

/// GET /_decoy/overrides
async fn list_overrides(State(state): State<AppState>) -> Json<OverrideListResponse> {
    let overrides = state.registry.entries();

    Json(OverrideListResponse {
        context: state.context.clone(),
        intercept: state.intercept,
        total: overrides.len(),
        overrides,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/_decoy/overrides", get(list_overrides))
}
