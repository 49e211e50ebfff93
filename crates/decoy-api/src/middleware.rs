//! Interception middleware for Axum
//!
//! Runs the dispatcher before the router's own handlers. An override
//! short-circuits the request; a pass-through hands the untouched request
//! to the rest of the stack.

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use decoy_core::{InterceptedRequest, Outcome};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Interception middleware
///
/// Handler failures surface as [`ApiError::Handler`], so they render like
/// any other handler error.
pub async fn intercept_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.intercept {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let intercepted = InterceptedRequest::from_parts(&parts);

    match state.dispatcher.intercept(&intercepted).await? {
        Outcome::Override(response) => {
            debug!(
                "[{}] Overrode {} {} with status {}",
                state.context,
                parts.method,
                parts.uri.path(),
                response.status
            );
            let response: axum::http::Response<Bytes> = response.into();
            Ok(response.map(Body::from).into_response())
        }
        Outcome::PassThrough => Ok(next.run(Request::from_parts(parts, body)).await),
    }
}

/// Wrap a router so every request, including the fallback, is intercepted
pub fn with_interception(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, intercept_middleware))
}
