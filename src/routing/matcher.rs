//! Request conditions a rule is matched on.
//!
//! # Design Decisions
//! - Host comparison ignores ASCII case and the port; `*.example.com`
//!   matches any subdomain but not `example.com` itself
//! - Path prefixes compare case-sensitively
//! - A rule with no conditions matches every request

use crate::http::GatewayRequest;

/// A single condition evaluated against a decoded request.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, req: &GatewayRequest) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Exact(String),
    /// Stored with the leading dot, e.g. `.example.com`.
    Suffix(String),
}

/// Matches the request host.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    pattern: HostPattern,
}

impl HostMatcher {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into().to_ascii_lowercase();
        let pattern = match host.strip_prefix('*') {
            Some(suffix) if suffix.starts_with('.') => HostPattern::Suffix(suffix.to_string()),
            _ => HostPattern::Exact(host),
        };
        Self { pattern }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &GatewayRequest) -> bool {
        let Some(host) = req.host() else {
            return false;
        };
        match &self.pattern {
            HostPattern::Exact(expected) => host.eq_ignore_ascii_case(expected),
            HostPattern::Suffix(suffix) => {
                host.len() > suffix.len()
                    && host.is_char_boundary(host.len() - suffix.len())
                    && host[host.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
            }
        }
    }
}

/// Matches the leading part of the request path.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &GatewayRequest) -> bool {
        req.path().starts_with(&self.prefix)
    }
}

/// All inner conditions must hold.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &GatewayRequest) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
