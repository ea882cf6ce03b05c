//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check rule identity (unique rule ids, unique filter ids per rule)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path to the offending field, e.g. `rules[2].backends[0]`.
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every issue.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        issues.push(ConfigIssue::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.timeouts.connect_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut rule_ids = HashSet::new();
    for (i, rule) in config.rules.iter().enumerate() {
        let at = format!("rules[{}]", i);

        if rule.id.trim().is_empty() {
            issues.push(ConfigIssue::new(format!("{}.id", at), "must not be empty"));
        } else if !rule_ids.insert(rule.id.as_str()) {
            issues.push(ConfigIssue::new(
                format!("{}.id", at),
                format!("duplicate rule id '{}'", rule.id),
            ));
        }

        if !rule.path_prefix.starts_with('/') {
            issues.push(ConfigIssue::new(
                format!("{}.path_prefix", at),
                format!("'{}' must start with '/'", rule.path_prefix),
            ));
        }

        for (j, backend) in rule.backends.iter().enumerate() {
            if backend.parse::<SocketAddr>().is_err() {
                issues.push(ConfigIssue::new(
                    format!("{}.backends[{}]", at, j),
                    format!("'{}' is not a socket address", backend),
                ));
            }
        }

        let mut filter_ids = HashSet::new();
        for (j, filter) in rule.filters.iter().enumerate() {
            if filter.id.trim().is_empty() {
                issues.push(ConfigIssue::new(
                    format!("{}.filters[{}].id", at, j),
                    "must not be empty",
                ));
            } else if !filter_ids.insert(filter.id.as_str()) {
                issues.push(ConfigIssue::new(
                    format!("{}.filters[{}].id", at, j),
                    format!("filter '{}' configured twice", filter.id),
                ));
            }
            if !(filter.config.is_null() || filter.config.is_object()) {
                issues.push(ConfigIssue::new(
                    format!("{}.filters[{}].config", at, j),
                    "must be a table",
                ));
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
