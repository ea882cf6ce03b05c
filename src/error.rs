//! Gateway pipeline error types.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::context::{AttributeError, ValidationError};

/// Errors surfaced to the pipeline's top-level handler.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The context could not be built.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A filter's data dependency was not satisfied.
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("no rule matches path {0}")]
    NoRoute(String),

    #[error("rule '{0}' has no backends")]
    NoBackend(String),

    #[error("invalid configuration for filter '{filter_id}': {source}")]
    FilterConfig {
        filter_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid request body: {0}")]
    Body(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl GatewayError {
    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_)
            | GatewayError::Attribute(_)
            | GatewayError::FilterConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NoRoute(_) => StatusCode::NOT_FOUND,
            GatewayError::NoBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "CONTEXT_BUILD_FAILED",
            GatewayError::Attribute(AttributeError::Missing { .. }) => "MISSING_ATTRIBUTE",
            GatewayError::Attribute(AttributeError::TypeMismatch { .. }) => "ATTRIBUTE_TYPE_MISMATCH",
            GatewayError::NoRoute(_) => "NO_ROUTE",
            GatewayError::NoBackend(_) => "NO_BACKEND",
            GatewayError::FilterConfig { .. } => "INVALID_FILTER_CONFIG",
            GatewayError::Unauthorized(_) => "UNAUTHORIZED",
            GatewayError::Upstream(_) => "UPSTREAM_ERROR",
            GatewayError::Timeout(_) => "GATEWAY_TIMEOUT",
            GatewayError::Body(_) => "INVALID_BODY",
            GatewayError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
