//! Configuration management

use anyhow::{Context, Result, bail};
use decoy_core::OverrideConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Static overrides installed on every intercepting listener
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OverrideConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Upper bound on a request, override handlers included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// One HTTP listener; each is its own interception context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub name: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_intercept")]
    pub intercept: bool,
}

impl ListenerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_intercept() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_listeners() -> Vec<ListenerConfig> {
    vec![ListenerConfig {
        name: "default".to_string(),
        bind_address: default_bind_address(),
        port: default_port(),
        intercept: default_intercept(),
    }]
}

impl Config {
    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Structural checks; override entries are validated at registration
    pub fn validate(&self) -> Result<()> {
        if self.listeners.is_empty() {
            bail!("At least one listener must be configured");
        }

        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        for listener in &self.listeners {
            if listener.name.trim().is_empty() {
                bail!("Listener name must not be empty");
            }
            if !names.insert(listener.name.as_str()) {
                bail!("Duplicate listener name '{}'", listener.name);
            }
            if !addresses.insert(listener.address()) {
                bail!(
                    "Listener '{}' reuses address {}",
                    listener.name,
                    listener.address()
                );
            }
        }

        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than zero");
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            bail!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            );
        }

        if !self.overrides.is_empty() && !self.listeners.iter().any(|l| l.intercept) {
            bail!("Overrides are configured but no listener has intercept enabled");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            listeners: default_listeners(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            overrides: Vec::new(),
        }
    }
}
