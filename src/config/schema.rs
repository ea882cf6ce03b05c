//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::context::Protocol;
use crate::routing::FilterConfig;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routing rules.
    pub rules: Vec<RuleConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest inbound body the gateway will buffer.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for the whole filter pipeline of one request, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Routing rule: match conditions, backends and per-filter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Unique rule identifier for logging/metrics.
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Protocol requests on this rule are served with.
    #[serde(default)]
    pub protocol: Protocol,

    /// Host to match; `*.example.com` matches any subdomain.
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Rule priority (higher = checked first).
    #[serde(default)]
    pub priority: i32,

    /// Backend addresses (e.g., "127.0.0.1:3000").
    #[serde(default)]
    pub backends: Vec<String>,

    /// Filter configuration blocks, keyed by filter id.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            protocol: Protocol::default(),
            host: None,
            path_prefix: default_path_prefix(),
            priority: 0,
            backends: Vec::new(),
            filters: Vec::new(),
        }
    }
}
