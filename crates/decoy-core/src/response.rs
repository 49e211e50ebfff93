//! Override responses and the pluggable handler / filter traits

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

use crate::error::HandlerFailure;
use crate::request::InterceptedRequest;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// A synthesized response that replaces the application's own
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OverrideResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Render a payload value: strings as plain text, everything else as JSON
    pub fn from_payload(status: StatusCode, payload: &Value) -> Self {
        match payload {
            Value::String(text) => Self::text(status, text.clone()),
            other => Self::json(status, other),
        }
    }

    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        response.body = Bytes::from(value.to_string());
        response
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        response.body = Bytes::from(text.into());
        response
    }

    /// An error response in the conventional `{statusCode, error, message}` shape
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &json!({
                "statusCode": status.as_u16(),
                "error": status.canonical_reason().unwrap_or("Unknown"),
                "message": message.into(),
            }),
        )
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl From<OverrideResponse> for http::Response<Bytes> {
    fn from(response: OverrideResponse) -> Self {
        let mut out = http::Response::new(response.body);
        *out.status_mut() = response.status;
        *out.headers_mut() = response.headers;
        out
    }
}

/// Functional override: computes the response for a matched request
#[async_trait]
pub trait OverrideHandler: Send + Sync {
    async fn handle(&self, request: &InterceptedRequest) -> Result<OverrideResponse, HandlerFailure>;
}

#[async_trait]
impl<F> OverrideHandler for F
where
    F: Fn(&InterceptedRequest) -> Result<OverrideResponse, HandlerFailure> + Send + Sync,
{
    async fn handle(&self, request: &InterceptedRequest) -> Result<OverrideResponse, HandlerFailure> {
        self(request)
    }
}

/// Per-request predicate deciding whether a matched override fires.
///
/// Implementations may keep their own state; the dispatcher calls the
/// filter exactly once per matched request.
#[async_trait]
pub trait RequestFilter: Send + Sync {
    async fn should_override(&self, request: &InterceptedRequest) -> bool;
}

#[async_trait]
impl<F> RequestFilter for F
where
    F: Fn(&InterceptedRequest) -> bool + Send + Sync,
{
    async fn should_override(&self, request: &InterceptedRequest) -> bool {
        self(request)
    }
}
