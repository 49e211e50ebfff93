//! Override entries and their activation policies

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::response::{OverrideHandler, OverrideResponse, RequestFilter};
use crate::routing::PathPattern;

/// Identifier shared by every per-host entry created by one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideId(Uuid);

impl OverrideId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OverrideId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OverrideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed response produced without running any code
#[derive(Debug, Clone, PartialEq)]
pub struct StaticResponse {
    status: StatusCode,
    headers: HeaderMap,
    payload: Value,
}

impl StaticResponse {
    /// A 200 response with the given payload
    pub fn new(payload: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            payload,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Build the response; configured headers replace the default content type
    pub fn render(&self) -> OverrideResponse {
        let mut response = OverrideResponse::from_payload(self.status, &self.payload);
        for (name, value) in &self.headers {
            response.headers.insert(name.clone(), value.clone());
        }
        response
    }
}

/// How an override produces its response
#[derive(Clone)]
pub enum ResponseSpec {
    Functional(Arc<dyn OverrideHandler>),
    Static(StaticResponse),
}

impl fmt::Debug for ResponseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSpec::Functional(_) => f.write_str("Functional(..)"),
            ResponseSpec::Static(s) => f.debug_tuple("Static").field(s).finish(),
        }
    }
}

/// Rule deciding, per matched request, whether the override fires
#[derive(Clone, Default)]
pub enum ActivationPolicy {
    /// Every match fires
    #[default]
    Always,
    /// The first match fires; the entry is inert afterwards
    OnceOnly,
    /// The first `n` matches pass through, later ones fire
    AfterCount(u64),
    /// The filter decides each time
    Filtered(Arc<dyn RequestFilter>),
}

impl ActivationPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            ActivationPolicy::Always => PolicyKind::Always,
            ActivationPolicy::OnceOnly => PolicyKind::Once,
            ActivationPolicy::AfterCount(_) => PolicyKind::After,
            ActivationPolicy::Filtered(_) => PolicyKind::Filter,
        }
    }
}

impl fmt::Debug for ActivationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationPolicy::Always => f.write_str("Always"),
            ActivationPolicy::OnceOnly => f.write_str("OnceOnly"),
            ActivationPolicy::AfterCount(n) => f.debug_tuple("AfterCount").field(n).finish(),
            ActivationPolicy::Filtered(_) => f.write_str("Filtered(..)"),
        }
    }
}

/// Policy discriminant for listings and logs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Always,
    Once,
    After,
    Filter,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Always => "always",
            PolicyKind::Once => "once",
            PolicyKind::After => "after",
            PolicyKind::Filter => "filter",
        }
    }
}

/// A stored override bound to one (method, path, host) route.
///
/// Everything but the match counter is fixed at registration.
pub struct OverrideEntry {
    id: OverrideId,
    method: String,
    pattern: PathPattern,
    host: String,
    response: ResponseSpec,
    policy: ActivationPolicy,
    matches_seen: AtomicU64,
    registered_at: DateTime<Utc>,
}

impl OverrideEntry {
    pub fn new(
        id: OverrideId,
        method: String,
        pattern: PathPattern,
        host: String,
        response: ResponseSpec,
        policy: ActivationPolicy,
    ) -> Self {
        Self {
            id,
            method,
            pattern,
            host,
            response,
            policy,
            matches_seen: AtomicU64::new(0),
            registered_at: Utc::now(),
        }
    }

    pub fn id(&self) -> OverrideId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn response(&self) -> &ResponseSpec {
        &self.response
    }

    pub fn policy(&self) -> &ActivationPolicy {
        &self.policy
    }

    pub fn matches_seen(&self) -> u64 {
        self.matches_seen.load(Ordering::Acquire)
    }

    /// Count one policy evaluation, returning the count before it.
    ///
    /// A single `fetch_add` serializes concurrent evaluations: each caller
    /// observes a distinct previous value.
    pub(crate) fn record_match(&self) -> u64 {
        self.matches_seen.fetch_add(1, Ordering::AcqRel)
    }

    pub fn summary(&self) -> OverrideSummary {
        OverrideSummary {
            id: self.id,
            method: self.method.clone(),
            path: self.pattern.to_string(),
            host: self.host.clone(),
            policy: self.policy.kind(),
            after: match self.policy {
                ActivationPolicy::AfterCount(n) => Some(n),
                _ => None,
            },
            functional: matches!(self.response, ResponseSpec::Functional(_)),
            matches_seen: self.matches_seen(),
            registered_at: self.registered_at,
        }
    }
}

impl fmt::Debug for OverrideEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideEntry")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("host", &self.host)
            .field("policy", &self.policy)
            .field("matches_seen", &self.matches_seen())
            .finish_non_exhaustive()
    }
}

/// Serializable snapshot of an entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideSummary {
    pub id: OverrideId,
    pub method: String,
    pub path: String,
    pub host: String,
    pub policy: PolicyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<u64>,
    pub functional: bool,
    pub matches_seen: u64,
    pub registered_at: DateTime<Utc>,
}
