//! Route lookup and hot reload.
//!
//! # Responsibilities
//! - Store compiled rules
//! - Look up the matching rule for a request
//! - Swap the whole rule set atomically on reload
//!
//! # Design Decisions
//! - Each rule set is immutable; reload replaces it through `ArcSwap`
//! - Lookups hand out `Arc<Rule>`, so in-flight requests keep the rule
//!   they resolved even after a reload
//! - Order: priority descending, then longer path prefix first
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::RuleConfig;
use crate::http::GatewayRequest;
use crate::routing::rule::Rule;

/// Resolves requests to rules.
#[derive(Debug)]
pub struct RuleRouter {
    rules: ArcSwap<Vec<Arc<Rule>>>,
}

impl RuleRouter {
    /// Compile the router from rule configuration.
    pub fn from_config(configs: &[RuleConfig]) -> Self {
        Self::from_rules(configs.iter().map(Rule::from_config).collect())
    }

    /// Build from already compiled rules.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: ArcSwap::from_pointee(Self::compile(rules)),
        }
    }

    fn compile(rules: Vec<Rule>) -> Vec<Arc<Rule>> {
        let mut rules: Vec<Arc<Rule>> = rules.into_iter().map(Arc::new).collect();
        rules.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| b.path_prefix().len().cmp(&a.path_prefix().len()))
        });
        rules
    }

    /// First matching rule, if any.
    pub fn resolve(&self, req: &GatewayRequest) -> Option<Arc<Rule>> {
        self.rules
            .load()
            .iter()
            .find(|rule| rule.matches(req))
            .cloned()
    }

    /// Replace the rule set. Requests already holding a rule are unaffected.
    pub fn reload(&self, configs: &[RuleConfig]) {
        let rules = Self::compile(configs.iter().map(Rule::from_config).collect());
        tracing::info!(rule_count = rules.len(), "Routing rules reloaded");
        self.rules.store(Arc::new(rules));
    }

    /// Snapshot of the current rule set, in match order.
    pub fn rules(&self) -> Arc<Vec<Arc<Rule>>> {
        self.rules.load_full()
    }

    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.load().is_empty()
    }
}
