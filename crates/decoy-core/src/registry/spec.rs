//! Raw override specifications and their validation
//!
//! An [`OverrideSpec`] is what callers hand to `register`. Validation
//! checks every field, collects all violations into a single error, and
//! resolves the handler and policy into their tagged forms exactly once.

use std::net::IpAddr;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entry::{ActivationPolicy, ResponseSpec, StaticResponse};
use crate::error::{CoreError, ValidationErrors};
use crate::response::{OverrideHandler, RequestFilter};
use crate::routing::{PathPattern, WILDCARD_HOST, normalize_host};

const DEFAULT_METHOD: &str = "get";
const MIN_STATUS_CODE: i64 = 200;
const MAX_STATUS_CODE: i64 = 999;
const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// One host or a list of hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VirtualHosts {
    One(String),
    Many(Vec<String>),
}

impl VirtualHosts {
    fn into_vec(self) -> Vec<String> {
        match self {
            VirtualHosts::One(host) => vec![host],
            VirtualHosts::Many(hosts) => hosts,
        }
    }
}

/// Unvalidated static response fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticHandlerSpec {
    pub status_code: Option<i64>,
    pub headers: Option<Map<String, Value>>,
    pub payload: Option<Value>,
}

/// Unvalidated handler
#[derive(Clone)]
pub enum HandlerSpec {
    Functional(Arc<dyn OverrideHandler>),
    Static(StaticHandlerSpec),
}

/// Raw registration input
#[derive(Clone, Default)]
pub struct OverrideSpec {
    pub method: Option<String>,
    pub path: Option<String>,
    pub handler: Option<HandlerSpec>,
    pub vhost: Option<VirtualHosts>,
    pub filter: Option<Arc<dyn RequestFilter>>,
    pub once: Option<bool>,
    pub after: Option<i64>,
}

impl OverrideSpec {
    /// Start a spec for the given route pattern
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Use a functional handler
    pub fn handler(mut self, handler: impl OverrideHandler + 'static) -> Self {
        self.handler = Some(HandlerSpec::Functional(Arc::new(handler)));
        self
    }

    /// Set the static payload, switching to a static handler if needed
    pub fn payload(self, payload: Value) -> Self {
        self.with_static(|spec| spec.payload = Some(payload))
    }

    /// Set the static status code, switching to a static handler if needed
    pub fn status_code(self, status_code: i64) -> Self {
        self.with_static(|spec| spec.status_code = Some(status_code))
    }

    /// Add a static response header, switching to a static handler if needed
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.with_static(|spec| {
            spec.headers
                .get_or_insert_with(Map::new)
                .insert(name, Value::String(value));
        })
    }

    pub fn vhost(mut self, host: impl Into<String>) -> Self {
        self.vhost = Some(VirtualHosts::One(host.into()));
        self
    }

    pub fn vhosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vhost = Some(VirtualHosts::Many(hosts.into_iter().map(Into::into).collect()));
        self
    }

    pub fn filter(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = Some(once);
        self
    }

    pub fn after(mut self, after: i64) -> Self {
        self.after = Some(after);
        self
    }

    fn with_static(mut self, update: impl FnOnce(&mut StaticHandlerSpec)) -> Self {
        let mut spec = match self.handler.take() {
            Some(HandlerSpec::Static(spec)) => spec,
            _ => StaticHandlerSpec::default(),
        };
        update(&mut spec);
        self.handler = Some(HandlerSpec::Static(spec));
        self
    }

    /// Check every field and resolve the spec into its registrable form
    pub fn validate(self) -> Result<ValidatedOverride, CoreError> {
        let mut errors = ValidationErrors::new();

        let method = validate_method(self.method.as_deref(), &mut errors);
        let pattern = validate_path(self.path.as_deref(), &mut errors);
        let response = validate_handler(self.handler, &mut errors);
        let hosts = validate_vhosts(self.vhost, &mut errors);
        let policy = validate_policy(self.filter, self.once, self.after, &mut errors);

        errors.into_result()?;

        match (pattern, response, policy) {
            (Some(pattern), Some(response), Some(policy)) => Ok(ValidatedOverride {
                method,
                pattern,
                hosts,
                response,
                policy,
            }),
            // Each missing piece recorded a violation above
            _ => Err(CoreError::Validation(ValidationErrors::new())),
        }
    }
}

/// A spec that passed validation; installing it cannot fail
#[derive(Debug, Clone)]
pub struct ValidatedOverride {
    pub method: String,
    pub pattern: PathPattern,
    pub hosts: Vec<String>,
    pub response: ResponseSpec,
    pub policy: ActivationPolicy,
}

/// HTTP method token grammar (RFC 7230 `tchar`)
pub fn is_method_token(method: &str) -> bool {
    !method.is_empty()
        && method.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// Hostname check: `*`, an IP address, or RFC 1123 labels
pub fn is_valid_hostname(host: &str) -> bool {
    if host == WILDCARD_HOST || host.parse::<IpAddr>().is_ok() {
        return true;
    }

    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

fn validate_method(method: Option<&str>, errors: &mut ValidationErrors) -> String {
    let method = method.unwrap_or(DEFAULT_METHOD);
    if !is_method_token(method) {
        errors.push(format!("method '{}' is not a valid HTTP method token", method));
    }
    method.to_ascii_lowercase()
}

fn validate_path(path: Option<&str>, errors: &mut ValidationErrors) -> Option<PathPattern> {
    match path {
        None | Some("") => {
            errors.push("path is required");
            None
        }
        Some(path) => match PathPattern::parse(path) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                errors.push(format!("path '{}' is invalid: {}", path, e));
                None
            }
        },
    }
}

fn validate_handler(
    handler: Option<HandlerSpec>,
    errors: &mut ValidationErrors,
) -> Option<ResponseSpec> {
    match handler {
        None => {
            errors.push("handler is required");
            None
        }
        Some(HandlerSpec::Functional(handler)) => Some(ResponseSpec::Functional(handler)),
        Some(HandlerSpec::Static(spec)) => validate_static(spec, errors).map(ResponseSpec::Static),
    }
}

fn validate_static(spec: StaticHandlerSpec, errors: &mut ValidationErrors) -> Option<StaticResponse> {
    let status = match spec.status_code {
        None => Some(StatusCode::OK),
        Some(code) if code < MIN_STATUS_CODE => {
            errors.push(format!(
                "handler.statusCode must be at least {}, got {}",
                MIN_STATUS_CODE, code
            ));
            None
        }
        Some(code) if code > MAX_STATUS_CODE => {
            errors.push(format!("handler.statusCode {} is not a valid HTTP status", code));
            None
        }
        Some(code) => {
            let parsed = u16::try_from(code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok());
            if parsed.is_none() {
                errors.push(format!("handler.statusCode {} is not a valid HTTP status", code));
            }
            parsed
        }
    };

    let headers = spec
        .headers
        .map(|headers| validate_headers(headers, errors))
        .unwrap_or_default();

    if spec.payload.is_none() {
        errors.push("handler.payload is required");
    }

    Some(
        StaticResponse::new(spec.payload?)
            .with_status(status?)
            .with_headers(headers),
    )
}

fn validate_headers(headers: Map<String, Value>, errors: &mut ValidationErrors) -> HeaderMap {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                errors.push(format!("handler.headers.{} must be a scalar value", name));
                continue;
            }
        };

        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            errors.push(format!("handler.headers: '{}' is not a valid header name", name));
            continue;
        };

        let Ok(header_value) = HeaderValue::from_str(&text) else {
            errors.push(format!("handler.headers.{} has an invalid value", name));
            continue;
        };

        map.insert(header_name, header_value);
    }

    map
}

fn validate_vhosts(vhost: Option<VirtualHosts>, errors: &mut ValidationErrors) -> Vec<String> {
    let hosts = vhost
        .map(VirtualHosts::into_vec)
        .unwrap_or_else(|| vec![WILDCARD_HOST.to_string()]);

    if hosts.is_empty() {
        errors.push("vhost must contain at least one host");
    }

    let mut resolved: Vec<String> = Vec::with_capacity(hosts.len());
    for host in hosts {
        if !is_valid_hostname(&host) {
            errors.push(format!("vhost '{}' is not a valid hostname", host));
            continue;
        }
        let host = normalize_host(&host);
        if !resolved.contains(&host) {
            resolved.push(host);
        }
    }

    resolved
}

fn validate_policy(
    filter: Option<Arc<dyn RequestFilter>>,
    once: Option<bool>,
    after: Option<i64>,
    errors: &mut ValidationErrors,
) -> Option<ActivationPolicy> {
    let supplied = [filter.is_some(), once.is_some(), after.is_some()]
        .into_iter()
        .filter(|s| *s)
        .count();
    let exclusive = supplied <= 1;
    if !exclusive {
        errors.push("only one of filter, once, after may be set");
    }

    let after = match after.map(u64::try_from) {
        None => None,
        Some(Ok(n)) if n >= 1 => Some(n),
        Some(_) => {
            errors.push(format!(
                "after must be a positive integer, got {}",
                after.unwrap_or_default()
            ));
            return None;
        }
    };

    if !exclusive {
        return None;
    }

    if let Some(filter) = filter {
        return Some(ActivationPolicy::Filtered(filter));
    }

    if let Some(n) = after {
        return Some(ActivationPolicy::AfterCount(n));
    }

    match once {
        Some(true) => Some(ActivationPolicy::OnceOnly),
        Some(false) | None => Some(ActivationPolicy::Always),
    }
}
