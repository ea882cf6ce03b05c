//! Filter pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayContext (built)
//!     → auth.rs        (order -100: extract principal, enforce if required)
//!     → load_balance.rs (order 0: pick a backend from the rule)
//!     → proxy.rs       (order 1000: forward, set the response)
//!     → back to the server for write-back and release
//! ```
//!
//! # Design Decisions
//! - Filters are sorted once by ascending order
//! - A filter reads its route settings through `ctx.filter_config(id)` and
//!   falls back to its own defaults when the route has none
//! - `Halt` ends the chain without an error; the filter has set the response

mod auth;
mod load_balance;
mod proxy;

pub use auth::{AuthFilter, AuthSettings, Principal, AUTH_FILTER_ID, PRINCIPAL_ATTRIBUTE};
pub use load_balance::{BackendTarget, LoadBalanceFilter, BACKEND_ATTRIBUTE, LOAD_BALANCE_FILTER_ID};
pub use proxy::{ProxyFilter, ProxySettings, PROXY_FILTER_ID, TIMEOUT_ATTRIBUTE};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::observability::metrics;

/// What the chain does after a filter returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Continue,
    Halt,
}

/// A pipeline stage that reads and writes the gateway context.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Identifier used to look up this filter's route configuration.
    fn id(&self) -> &'static str;

    /// Position in the chain; lower runs first.
    fn order(&self) -> i32;

    async fn apply(&self, ctx: &mut GatewayContext) -> Result<FilterAction, GatewayError>;
}

/// Decode `filter_id`'s settings for the context's route, or the defaults
/// when the route does not configure that filter.
pub fn settings<T: DeserializeOwned + Default>(
    ctx: &GatewayContext,
    filter_id: &str,
) -> Result<T, GatewayError> {
    match ctx.filter_config(filter_id) {
        Some(block) => block.parse().map_err(|source| GatewayError::FilterConfig {
            filter_id: filter_id.to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

/// Ordered list of filters executed as a pipeline.
#[derive(Clone)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    /// Build a chain from a list of filters, sorted by their declared order.
    pub fn new(mut filters: Vec<Arc<dyn Filter>>) -> Self {
        filters.sort_by_key(|f| f.order());
        Self { filters }
    }

    /// The built-in auth → load balance → proxy chain.
    pub fn standard(connect_timeout: Duration) -> Self {
        Self::new(vec![
            Arc::new(AuthFilter),
            Arc::new(LoadBalanceFilter::new()),
            Arc::new(ProxyFilter::new(connect_timeout)),
        ])
    }

    pub fn filter_ids(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.id()).collect()
    }

    /// Run every filter in order. Stops at the first `Halt` or error.
    pub async fn run(&self, ctx: &mut GatewayContext) -> Result<(), GatewayError> {
        for filter in &self.filters {
            match filter.apply(ctx).await {
                Ok(FilterAction::Continue) => {}
                Ok(FilterAction::Halt) => {
                    tracing::debug!(
                        request_id = %ctx.unique_id(),
                        filter = filter.id(),
                        "Filter halted the chain"
                    );
                    return Ok(());
                }
                Err(e) => {
                    metrics::record_filter_error(filter.id());
                    tracing::warn!(
                        request_id = %ctx.unique_id(),
                        filter = filter.id(),
                        error = %e,
                        "Filter failed"
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.filter_ids()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use crate::http::GatewayResponse;
    use crate::routing::{FilterConfig, Rule};
    use axum::http::StatusCode;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        id: &'static str,
        order: i32,
        action: FilterAction,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Filter for Recording {
        fn id(&self) -> &'static str {
            self.id
        }

        fn order(&self) -> i32 {
            self.order
        }

        async fn apply(&self, ctx: &mut GatewayContext) -> Result<FilterAction, GatewayError> {
            self.log.lock().unwrap().push(self.id);
            ctx.set_response(GatewayResponse::ok(self.id));
            Ok(self.action)
        }
    }

    fn recording(
        id: &'static str,
        order: i32,
        action: FilterAction,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Filter> {
        Arc::new(Recording {
            id,
            order,
            action,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn runs_in_order_until_halt() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![
            recording("third", 30, FilterAction::Continue, &log),
            recording("first", 10, FilterAction::Continue, &log),
            recording("second", 20, FilterAction::Halt, &log),
        ]);
        assert_eq!(chain.filter_ids(), vec!["first", "second", "third"]);

        let mut ctx = context(Rule::new("r", "/"));
        chain.run(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(ctx.response().unwrap().body(), "second");
    }

    struct Requires;

    #[async_trait]
    impl Filter for Requires {
        fn id(&self) -> &'static str {
            "requires"
        }

        fn order(&self) -> i32 {
            0
        }

        async fn apply(&self, ctx: &mut GatewayContext) -> Result<FilterAction, GatewayError> {
            ctx.required_attribute::<String>("upstream.token")?;
            Ok(FilterAction::Continue)
        }
    }

    #[tokio::test]
    async fn missing_attribute_surfaces_as_error() {
        let chain = FilterChain::new(vec![Arc::new(Requires)]);
        let mut ctx = context(Rule::new("r", "/"));

        let err = chain.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_ATTRIBUTE");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Limits {
        max: u32,
    }

    #[test]
    fn settings_default_when_unconfigured() {
        let ctx = context(Rule::new("r", "/"));
        let limits: Limits = settings(&ctx, "limits").unwrap();
        assert_eq!(limits.max, 0);

        let ctx = context(Rule::new("r", "/").with_filter(FilterConfig::new("limits", json!({ "max": 5 }))));
        let limits: Limits = settings(&ctx, "limits").unwrap();
        assert_eq!(limits.max, 5);

        let ctx = context(Rule::new("r", "/").with_filter(FilterConfig::new("limits", json!({ "max": "lots" }))));
        let err = settings::<Limits>(&ctx, "limits").unwrap_err();
        assert_eq!(err.code(), "INVALID_FILTER_CONFIG");
    }
}
