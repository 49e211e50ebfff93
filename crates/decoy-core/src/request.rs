//! Request view handed to the dispatcher, handlers and filters

use std::collections::HashMap;

use http::header::HOST;
use http::request::Parts;
use http::{HeaderMap, Method};

/// The parts of an inbound request the override engine looks at
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    path: String,
    host: Option<String>,
    query: Option<String>,
    headers: HeaderMap,
    params: HashMap<String, String>,
}

impl InterceptedRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            host: None,
            query: None,
            headers: HeaderMap::new(),
            params: HashMap::new(),
        }
    }

    /// Build from the head of an HTTP request.
    ///
    /// The hostname comes from the URI authority when present, otherwise
    /// from the `Host` header, with any port and IPv6 brackets stripped.
    pub fn from_parts(parts: &Parts) -> Self {
        let host = parts
            .uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(strip_port)
            })
            .filter(|h| !h.is_empty());

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            host,
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            params: HashMap::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Path parameters captured by the matched override route
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Drop a `:port` suffix, leaving bracketed IPv6 literals intact
fn strip_port(host: &str) -> String {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest).to_string();
    }
    host.split(':').next().unwrap_or(host).to_string()
}
