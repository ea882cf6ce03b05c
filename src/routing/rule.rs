//! Compiled routing rules and per-filter configuration.
//!
//! # Responsibilities
//! - Hold one route's match conditions, backends and filter settings
//! - Answer `filter_config(id)` lookups for the gateway context
//!
//! # Design Decisions
//! - A `Rule` is immutable once compiled and shared as `Arc<Rule>`
//! - Filter configs are indexed by id at compile time; lookups are pure
//! - Filter settings stay untyped JSON until the owning filter parses them

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RuleConfig;
use crate::context::Protocol;
use crate::http::GatewayRequest;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// One filter's configuration block within a rule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Filter identifier, e.g. `"auth"`.
    pub id: String,

    /// Filter-specific settings.
    #[serde(default)]
    pub config: Value,
}

impl FilterConfig {
    pub fn new(id: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    /// A single setting by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Decode the settings into a filter's typed configuration.
    /// A block without settings decodes as an empty object.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.config {
            Value::Null => serde_json::from_value(Value::Object(Default::default())),
            other => serde_json::from_value(other.clone()),
        }
    }
}

/// Immutable routing configuration for one route.
#[derive(Debug)]
pub struct Rule {
    id: String,
    name: String,
    protocol: Protocol,
    priority: i32,
    path_prefix: String,
    backends: Vec<SocketAddr>,
    filters: HashMap<String, FilterConfig>,
    matcher: AndMatcher,
    host: Option<String>,
}

impl Rule {
    /// Create a rule matching `path_prefix` with no backends or filters.
    pub fn new(id: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        let mut rule = Self {
            id: id.into(),
            name: String::new(),
            protocol: Protocol::Http,
            priority: 0,
            path_prefix: path_prefix.into(),
            backends: Vec::new(),
            filters: HashMap::new(),
            matcher: AndMatcher::default(),
            host: None,
        };
        rule.rebuild_matcher();
        rule
    }

    /// Compile a rule from configuration.
    ///
    /// Unparsable backend addresses are skipped with a warning; config
    /// validation rejects them before a file is ever accepted.
    pub fn from_config(config: &RuleConfig) -> Self {
        let mut rule = Rule::new(config.id.clone(), config.path_prefix.clone())
            .with_name(config.name.clone())
            .with_protocol(config.protocol)
            .with_priority(config.priority);

        if let Some(host) = &config.host {
            rule = rule.with_host(host.clone());
        }

        for address in &config.backends {
            match address.parse() {
                Ok(addr) => rule.backends.push(addr),
                Err(_) => tracing::warn!(rule = %config.id, address = %address, "Invalid backend address"),
            }
        }

        for filter in &config.filters {
            rule = rule.with_filter(filter.clone());
        }

        rule
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self.rebuild_matcher();
        self
    }

    pub fn with_backend(mut self, addr: SocketAddr) -> Self {
        self.backends.push(addr);
        self
    }

    /// Add a filter block. A later block with the same id replaces the earlier one.
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.insert(filter.id.clone(), filter);
        self
    }

    fn rebuild_matcher(&mut self) {
        let mut matchers: Vec<Box<dyn Matcher>> =
            vec![Box::new(PathPrefixMatcher::new(self.path_prefix.clone()))];
        if let Some(host) = &self.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        self.matcher = AndMatcher::new(matchers);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn backends(&self) -> &[SocketAddr] {
        &self.backends
    }

    /// Configuration for `filter_id`, or `None` when this route does not
    /// configure that filter.
    pub fn filter_config(&self, filter_id: &str) -> Option<&FilterConfig> {
        self.filters.get(filter_id)
    }

    pub fn filter_ids(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Returns true if the request satisfies every condition of this rule.
    pub fn matches(&self, req: &GatewayRequest) -> bool {
        self.matcher.matches(req)
    }
}
