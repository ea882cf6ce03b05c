//! Fail-fast construction of gateway contexts.
//!
//! Every required input is checked before anything is assembled, so a
//! filter never sees a partially built context.

use std::sync::Arc;

use crate::context::connection::{ConnectionContext, Protocol};
use crate::context::error::ValidationError;
use crate::context::gateway::GatewayContext;
use crate::http::GatewayRequest;
use crate::net::TransportHandle;
use crate::observability::metrics;
use crate::routing::Rule;

/// Accumulates the inputs of a [`GatewayContext`].
///
/// `protocol`, `transport`, `request` and `rule` are required;
/// `keep_alive` defaults to `false`.
#[derive(Debug, Default)]
pub struct GatewayContextBuilder {
    protocol: Option<Protocol>,
    transport: Option<TransportHandle>,
    request: Option<GatewayRequest>,
    rule: Option<Arc<Rule>>,
    keep_alive: bool,
}

impl GatewayContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn transport(mut self, transport: TransportHandle) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn request(mut self, request: GatewayRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn rule(mut self, rule: Arc<Rule>) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Assemble the context, or name the first missing required input.
    ///
    /// Fields are checked in the order protocol, transport, request, rule.
    pub fn build(self) -> Result<GatewayContext, ValidationError> {
        let protocol = required(self.protocol, "protocol")?;
        let transport = required(self.transport, "transport")?;
        let request = required(self.request, "request")?;
        let rule = required(self.rule, "rule")?;

        tracing::debug!(
            request_id = %request.unique_id(),
            rule = %rule.id(),
            protocol = %protocol,
            connection_id = %transport.id(),
            keep_alive = self.keep_alive,
            "Gateway context built"
        );

        Ok(GatewayContext::assemble(
            ConnectionContext::new(protocol, transport, self.keep_alive),
            request,
            rule,
        ))
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or_else(|| {
        metrics::record_context_build_failure(field);
        ValidationError::MissingField { field }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::Request;

    fn request() -> GatewayRequest {
        let (parts, _) = Request::builder()
            .uri("/orders")
            .header("x-request-id", "build-1")
            .body(())
            .unwrap()
            .into_parts();
        GatewayRequest::new(parts, Bytes::from_static(b"{}"))
    }

    fn transport() -> TransportHandle {
        TransportHandle::new("192.168.1.9:5050".parse().unwrap())
    }

    fn complete() -> GatewayContextBuilder {
        GatewayContext::builder()
            .protocol(Protocol::Https)
            .transport(transport())
            .request(request())
            .rule(Arc::new(Rule::new("orders", "/orders")))
    }

    #[test]
    fn build_returns_exact_inputs() {
        let transport = transport();
        let rule = Arc::new(Rule::new("orders", "/orders"));
        let ctx = GatewayContext::builder()
            .protocol(Protocol::WebSocket)
            .transport(transport.clone())
            .request(request())
            .rule(Arc::clone(&rule))
            .keep_alive(true)
            .build()
            .unwrap();

        assert_eq!(ctx.protocol(), Protocol::WebSocket);
        assert!(ctx.transport().same_connection(&transport));
        assert!(ctx.keep_alive());
        assert_eq!(ctx.request().unique_id(), "build-1");
        assert!(Arc::ptr_eq(ctx.rule(), &rule));
        assert!(ctx.response().is_none());
        assert!(!ctx.is_released());
        assert!(ctx.attributes().is_empty());
    }

    #[test]
    fn keep_alive_defaults_to_false() {
        let ctx = complete().build().unwrap();
        assert!(!ctx.keep_alive());
    }

    #[test]
    fn missing_fields_are_named() {
        let err = GatewayContext::builder()
            .transport(transport())
            .request(request())
            .rule(Arc::new(Rule::new("orders", "/orders")))
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "protocol" });

        let err = GatewayContext::builder()
            .protocol(Protocol::Http)
            .request(request())
            .rule(Arc::new(Rule::new("orders", "/orders")))
            .build()
            .unwrap_err();
        assert_eq!(err.field(), "transport");

        let err = GatewayContext::builder()
            .protocol(Protocol::Http)
            .transport(transport())
            .rule(Arc::new(Rule::new("orders", "/orders")))
            .build()
            .unwrap_err();
        assert_eq!(err.field(), "request");

        let err = GatewayContext::builder()
            .protocol(Protocol::Http)
            .transport(transport())
            .request(request())
            .build()
            .unwrap_err();
        assert_eq!(err.field(), "rule");
    }

    #[test]
    fn empty_builder_reports_first_field() {
        let err = GatewayContextBuilder::new().keep_alive(true).build().unwrap_err();
        assert_eq!(err.field(), "protocol");
    }
}
