//! Terminal filter: forward to the selected backend.
//!
//! # Responsibilities
//! - Rebuild the request for the backend (hop-by-hop headers stripped,
//!   `x-request-id` and `x-forwarded-for` set)
//! - Enforce the per-route upstream timeout
//! - Buffer the backend response into the context
//!
//! # Design Decisions
//! - Depends on the load balancer through the `balancer.backend` attribute;
//!   running without it is a pipeline defect and fails loudly
//! - An earlier filter may shorten the timeout via the `proxy.timeout`
//!   attribute

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;

use super::load_balance::{BackendTarget, BACKEND_ATTRIBUTE};
use super::{settings, Filter, FilterAction};
use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::is_hop_by_hop;
use crate::http::GatewayResponse;

pub const PROXY_FILTER_ID: &str = "proxy";

/// Attribute key for an optional `Duration` overriding the route's upstream timeout.
pub const TIMEOUT_ATTRIBUTE: &str = "proxy.timeout";

/// Route settings for the proxy filter.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxySettings {
    /// Upstream request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Largest backend response body that will be buffered.
    pub max_response_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

pub struct ProxyFilter {
    client: Client<HttpConnector, Body>,
}

impl ProxyFilter {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    fn upstream_request(ctx: &GatewayContext, target: BackendTarget) -> Result<Request<Body>, GatewayError> {
        let request = ctx.request();
        let body = request
            .body()
            .ok_or_else(|| GatewayError::Upstream("request buffer already released".into()))?;

        let mut builder = Request::builder()
            .method(request.method().clone())
            .uri(format!("http://{}{}", target.0, request.path_and_query()));

        if let Some(headers) = builder.headers_mut() {
            for (name, value) in request.headers() {
                if !is_hop_by_hop(name) && name != header::HOST && name != header::CONTENT_LENGTH {
                    headers.append(name.clone(), value.clone());
                }
            }
            if let Ok(id) = HeaderValue::from_str(request.unique_id()) {
                headers.insert(X_REQUEST_ID, id);
            }
            if let Ok(peer) = HeaderValue::from_str(&ctx.transport().peer_addr().ip().to_string()) {
                headers.append("x-forwarded-for", peer);
            }
            if let Some(host) = request.header(header::HOST.as_str()) {
                if let Ok(host) = HeaderValue::from_str(host) {
                    headers.insert("x-forwarded-host", host);
                }
            }
        }

        builder
            .body(Body::from(body))
            .map_err(|e| GatewayError::Upstream(e.to_string()))
    }
}

impl std::fmt::Debug for ProxyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFilter").finish_non_exhaustive()
    }
}

#[async_trait]
impl Filter for ProxyFilter {
    fn id(&self) -> &'static str {
        PROXY_FILTER_ID
    }

    fn order(&self) -> i32 {
        1000
    }

    async fn apply(&self, ctx: &mut GatewayContext) -> Result<FilterAction, GatewayError> {
        let settings: ProxySettings = settings(ctx, PROXY_FILTER_ID)?;
        let target = *ctx.required_attribute::<BackendTarget>(BACKEND_ATTRIBUTE)?;
        let timeout = ctx.attribute_or_default(TIMEOUT_ATTRIBUTE, Duration::from_millis(settings.timeout_ms));

        let upstream = Self::upstream_request(ctx, target)?;

        tracing::debug!(
            request_id = %ctx.unique_id(),
            backend = %target.0,
            timeout_ms = timeout.as_millis() as u64,
            "Forwarding request"
        );

        let response: hyper::Response<Incoming> =
            match tokio::time::timeout(timeout, self.client.request(upstream)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::error!(request_id = %ctx.unique_id(), backend = %target.0, error = %e, "Upstream error");
                    return Err(GatewayError::Upstream(e.to_string()));
                }
                Err(_) => return Err(GatewayError::Timeout(timeout)),
            };

        let method = ctx.request().method().clone();
        let (parts, incoming) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(incoming), settings.max_response_bytes)
            .await
            .map_err(|e| GatewayError::Upstream(format!("reading response body: {}", e)))?;

        ctx.set_response(GatewayResponse::from_upstream(&method, parts.status, parts.headers, body));
        Ok(FilterAction::Continue)
    }
}
