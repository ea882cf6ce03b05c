//! The per-request gateway context.
//!
//! # Responsibilities
//! - Own the decoded request, the response slot and the attribute store
//! - Expose the route's filter configuration to filters
//! - Release the inbound buffer exactly once, whichever path concludes first
//!
//! # Design Decisions
//! - Request and rule are fixed at construction and never replaced
//! - The release guard is the only atomic; attributes and response rely on
//!   `&mut` for exclusive access
//! - Concurrent conclusion paths use a cloned `ReleaseHandle` that shares
//!   the guard
//! - Dropping an unreleased context releases it
//!
//! # Release Ordering
//! Release and `set_response` may happen in either order. Releasing only
//! drops the inbound body: response, attributes, rule and correlation ID
//! stay readable afterwards. A released context is never reset or reused.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::context::attributes::Attributes;
use crate::context::builder::GatewayContextBuilder;
use crate::context::connection::{ConnectionContext, Protocol};
use crate::context::error::AttributeError;
use crate::http::{GatewayRequest, GatewayResponse};
use crate::net::TransportHandle;
use crate::observability::metrics;
use crate::routing::{FilterConfig, Rule};

#[derive(Debug)]
struct ReleaseGuard {
    released: AtomicBool,
    request: GatewayRequest,
}

impl ReleaseGuard {
    fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let bytes = self.request.buffer().release();
        metrics::record_buffer_release(bytes);
        tracing::trace!(
            request_id = %self.request.unique_id(),
            bytes,
            "Request buffer released"
        );
        true
    }
}

/// Releases a context's inbound buffer from outside the pipeline.
///
/// Obtained from [`GatewayContext::release_handle`]. All handles of one
/// context and the context itself share a single guard: the first caller
/// releases, every later or racing caller is a no-op.
#[derive(Debug, Clone)]
pub struct ReleaseHandle {
    guard: Arc<ReleaseGuard>,
}

impl ReleaseHandle {
    /// Returns true if this call performed the release.
    pub fn release(&self) -> bool {
        self.guard.release()
    }

    pub fn is_released(&self) -> bool {
        self.guard.released.load(Ordering::Acquire)
    }

    pub fn unique_id(&self) -> &str {
        self.guard.request.unique_id()
    }
}

/// Mutable execution unit threaded through the filter pipeline for one request.
#[derive(Debug)]
pub struct GatewayContext {
    connection: ConnectionContext,
    guard: Arc<ReleaseGuard>,
    response: Option<GatewayResponse>,
    rule: Arc<Rule>,
    attributes: Attributes,
}

impl GatewayContext {
    /// Start building a context. See [`GatewayContextBuilder`].
    pub fn builder() -> GatewayContextBuilder {
        GatewayContextBuilder::new()
    }

    /// Only reachable through the builder, which has validated every input.
    pub(crate) fn assemble(
        connection: ConnectionContext,
        request: GatewayRequest,
        rule: Arc<Rule>,
    ) -> Self {
        Self {
            connection,
            guard: Arc::new(ReleaseGuard {
                released: AtomicBool::new(false),
                request,
            }),
            response: None,
            rule,
            attributes: Attributes::new(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.connection.protocol()
    }

    pub fn transport(&self) -> &TransportHandle {
        self.connection.transport()
    }

    pub fn keep_alive(&self) -> bool {
        self.connection.keep_alive()
    }

    pub fn connection(&self) -> &ConnectionContext {
        &self.connection
    }

    pub fn request(&self) -> &GatewayRequest {
        &self.guard.request
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// The request's correlation ID.
    pub fn unique_id(&self) -> &str {
        self.guard.request.unique_id()
    }

    /// This route's configuration for `filter_id`, looked up on every call.
    /// `None` means the route does not override that filter's defaults.
    pub fn filter_config(&self, filter_id: &str) -> Option<&FilterConfig> {
        self.rule.filter_config(filter_id)
    }

    // --- Response ---

    /// Overwrite the response. The last write wins; earlier ones are discarded.
    pub fn set_response(&mut self, response: GatewayResponse) {
        if self.response.is_some() {
            tracing::debug!(request_id = %self.unique_id(), "Replacing existing response");
        }
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&GatewayResponse> {
        self.response.as_ref()
    }

    /// Move the response out for write-back.
    pub fn take_response(&mut self) -> Option<GatewayResponse> {
        self.response.take()
    }

    // --- Release ---

    /// Release the inbound buffer. Only the first call across this context
    /// and all its handles does any work; it returns true. Every other call,
    /// including ones racing on other threads, returns false.
    pub fn release_request(&self) -> bool {
        self.guard.release()
    }

    pub fn is_released(&self) -> bool {
        self.guard.released.load(Ordering::Acquire)
    }

    /// A handle for concluding this request from another task.
    pub fn release_handle(&self) -> ReleaseHandle {
        ReleaseHandle {
            guard: Arc::clone(&self.guard),
        }
    }

    // --- Attributes ---

    pub fn set_attribute<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.attributes.insert(key, value);
    }

    pub fn attribute<T: Any>(&self, key: &str) -> Result<Option<&T>, AttributeError> {
        self.attributes.get(key)
    }

    /// Fails with [`AttributeError::Missing`] when no earlier filter set `key`.
    pub fn required_attribute<T: Any>(&self, key: &str) -> Result<&T, AttributeError> {
        self.attributes.require(key).inspect_err(|err| {
            tracing::error!(request_id = %self.unique_id(), error = %err, "Attribute contract violated");
        })
    }

    pub fn attribute_or_default<T: Any + Clone>(&self, key: &str, default: T) -> T {
        self.attributes.get_or(key, default)
    }

    pub fn remove_attribute(&mut self, key: &str) -> bool {
        self.attributes.remove(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl Drop for GatewayContext {
    fn drop(&mut self) {
        if self.release_request() {
            tracing::debug!(request_id = %self.unique_id(), "Context dropped before release");
        }
    }
}
