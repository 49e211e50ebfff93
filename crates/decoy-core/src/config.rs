//! Declarative override configuration
//!
//! Static overrides can be listed in the binary's config file. These types
//! describe one such entry; they convert into an [`OverrideSpec`] and go
//! through the same validation as programmatic registrations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::{HandlerSpec, OverrideSpec, StaticHandlerSpec, VirtualHosts};

/// A statically configured override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideConfig {
    /// HTTP method; "get" when omitted, "*" for any
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// One host or a list of hosts
    #[serde(default)]
    pub vhost: Option<VirtualHosts>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub once: Option<bool>,
    #[serde(default)]
    pub after: Option<i64>,
}

impl OverrideConfig {
    /// Short label for logs
    pub fn describe(&self) -> String {
        format!(
            "{} {}",
            self.method.as_deref().unwrap_or("get"),
            self.path.as_deref().unwrap_or("<missing path>")
        )
    }
}

impl From<OverrideConfig> for OverrideSpec {
    fn from(config: OverrideConfig) -> Self {
        OverrideSpec {
            method: config.method,
            path: config.path,
            handler: Some(HandlerSpec::Static(StaticHandlerSpec {
                status_code: config.status_code,
                headers: config.headers,
                payload: config.payload,
            })),
            vhost: config.vhost,
            filter: None,
            once: config.once,
            after: config.after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Wrapper {
        overrides: Vec<OverrideConfig>,
    }

    #[test]
    fn test_parse_overrides_from_toml() {
        let wrapper: Wrapper = toml::from_str(
            r#"
            [[overrides]]
            path = "/status"
            payload = { ok = false }
            status_code = 503
            headers = { "retry-after" = "30" }

            [[overrides]]
            method = "post"
            path = "/users/{id}"
            vhost = ["a.example.com", "b.example.com"]
            payload = "created"
            after = 2
            "#,
        )
        .unwrap();

        assert_eq!(wrapper.overrides.len(), 2);

        let first = &wrapper.overrides[0];
        assert_eq!(first.path.as_deref(), Some("/status"));
        assert_eq!(first.status_code, Some(503));
        assert_eq!(first.payload, Some(json!({"ok": false})));
        assert_eq!(first.describe(), "get /status");

        let second = &wrapper.overrides[1];
        assert_eq!(
            second.vhost,
            Some(VirtualHosts::Many(vec![
                "a.example.com".to_string(),
                "b.example.com".to_string()
            ]))
        );
        assert_eq!(second.after, Some(2));
    }

    #[test]
    fn test_single_vhost_string() {
        let wrapper: Wrapper = toml::from_str(
            r#"
            [[overrides]]
            path = "/"
            vhost = "example.com"
            payload = 1
            "#,
        )
        .unwrap();

        assert_eq!(
            wrapper.overrides[0].vhost,
            Some(VirtualHosts::One("example.com".to_string()))
        );
    }

    #[test]
    fn test_config_converts_to_valid_spec() {
        let config = OverrideConfig {
            path: Some("/teapot".to_string()),
            status_code: Some(418),
            payload: Some(json!("short and stout")),
            once: Some(true),
            ..OverrideConfig::default()
        };

        let validated = OverrideSpec::from(config).validate().unwrap();
        assert_eq!(validated.method, "get");
        assert_eq!(validated.hosts, vec!["*".to_string()]);
    }

    #[test]
    fn test_config_without_payload_is_rejected() {
        let config = OverrideConfig {
            path: Some("/".to_string()),
            ..OverrideConfig::default()
        };

        match OverrideSpec::from(config).validate() {
            Err(CoreError::Validation(errors)) => assert!(errors.mentions("payload")),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }
}
