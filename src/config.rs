//! Service configuration for amqp-link
//!
//! Configuration is read from a TOML file. Secrets such as the broker
//! endpoint (which usually embeds credentials) can be named by environment
//! variable instead of written inline; those are resolved at runtime.

use crate::observability::logging::{LogFormat, LoggingSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

/// Main service configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Service section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Service identifier (must match [a-zA-Z0-9._-]+)
    pub name: String,
}

/// Broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URI written inline, e.g. `amqp://localhost:5672`
    pub endpoint: Option<String>,
    /// Environment variable containing the broker URI
    pub endpoint_env: Option<String>,
    /// Label shown by the broker for this connection (defaults to the service name)
    pub connection_name: Option<String>,
    /// Upper bound for each close operation during shutdown
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

fn default_close_timeout() -> u64 {
    10
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Component name attached to every log line
    #[serde(default = "default_component")]
    pub component: String,
    /// Minimum level (error, warn, info, debug, trace)
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format (json, pretty, compact)
    #[serde(default = "default_format")]
    pub format: String,
    /// Log sink endpoint written inline
    pub sink_url: Option<String>,
    /// Environment variable containing the log sink endpoint
    pub sink_url_env: Option<String>,
}

fn default_component() -> String {
    "amqpConnection".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            component: default_component(),
            level: default_level(),
            format: default_format(),
            sink_url: None,
            sink_url_env: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid service name: {0}")]
    InvalidServiceName(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_service_name(&self.service.name)?;
        self.broker.validate()?;
        Ok(())
    }

    /// Resolve the broker endpoint, preferring the inline value
    pub fn broker_endpoint(&self) -> Result<String, ConfigError> {
        match (&self.broker.endpoint, &self.broker.endpoint_env) {
            (Some(endpoint), _) => Ok(endpoint.clone()),
            (None, Some(env_name)) => Self::get_env_var_required(env_name),
            (None, None) => Err(ConfigError::InvalidConfig(
                "[broker] requires endpoint or endpoint_env".to_string(),
            )),
        }
    }

    /// Label the broker shows for this connection
    pub fn connection_name(&self) -> &str {
        self.broker
            .connection_name
            .as_deref()
            .unwrap_or(&self.service.name)
    }

    /// Bound applied to each close during shutdown
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.broker.close_timeout_secs)
    }

    /// Resolve the log sink endpoint, if one is configured
    pub fn log_sink_url(&self) -> Option<String> {
        self.logging
            .sink_url
            .clone()
            .or_else(|| Self::get_env_var_optional(self.logging.sink_url_env.as_ref()))
    }

    /// Settings for the logging subsystem
    pub fn logging_settings(&self) -> LoggingSettings {
        LoggingSettings {
            level: parse_level(&self.logging.level),
            format: LogFormat::parse(&self.logging.format),
            component: self.logging.component.clone(),
            sink_url: self.log_sink_url(),
            include_spans: false,
        }
    }

    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }
}

impl BrokerSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_none() && self.endpoint_env.is_none() {
            return Err(ConfigError::InvalidConfig(
                "[broker] requires endpoint or endpoint_env".to_string(),
            ));
        }

        if let Some(endpoint) = &self.endpoint {
            crate::transport::amqp::validate_endpoint(endpoint)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        }

        if let Some(name) = &self.connection_name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "[broker] connection_name must not be empty".to_string(),
                ));
            }
        }

        if self.close_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "[broker] close_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a level name, falling back to INFO for anything unrecognised
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

fn validate_service_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidServiceName(format!(
            "Service name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
