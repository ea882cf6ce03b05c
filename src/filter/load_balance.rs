//! Round-robin backend selection.
//!
//! # Design Decisions
//! - One rotation counter per rule id, kept across requests in a `DashMap`
//! - Counters survive rule reloads; a changed backend list just rotates over
//!   the new addresses

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Filter, FilterAction};
use crate::context::GatewayContext;
use crate::error::GatewayError;

pub const LOAD_BALANCE_FILTER_ID: &str = "load_balance";

/// Attribute key holding the [`BackendTarget`] chosen for the request.
pub const BACKEND_ATTRIBUTE: &str = "balancer.backend";

/// Backend the request will be forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTarget(pub SocketAddr);

/// Picks the next backend of the request's rule.
#[derive(Debug, Default)]
pub struct LoadBalanceFilter {
    counters: DashMap<String, AtomicUsize>,
}

impl LoadBalanceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_index(&self, rule_id: &str, len: usize) -> usize {
        if let Some(counter) = self.counters.get(rule_id) {
            return counter.fetch_add(1, Ordering::Relaxed) % len;
        }
        let counter = self
            .counters
            .entry(rule_id.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        counter.fetch_add(1, Ordering::Relaxed) % len
    }
}

#[async_trait]
impl Filter for LoadBalanceFilter {
    fn id(&self) -> &'static str {
        LOAD_BALANCE_FILTER_ID
    }

    fn order(&self) -> i32 {
        0
    }

    async fn apply(&self, ctx: &mut GatewayContext) -> Result<FilterAction, GatewayError> {
        let rule = ctx.rule();
        let backends = rule.backends();
        if backends.is_empty() {
            return Err(GatewayError::NoBackend(rule.id().to_string()));
        }

        let target = BackendTarget(backends[self.next_index(rule.id(), backends.len())]);
        tracing::debug!(request_id = %ctx.unique_id(), backend = %target.0, "Backend selected");
        ctx.set_attribute(BACKEND_ATTRIBUTE, target);
        Ok(FilterAction::Continue)
    }
}
