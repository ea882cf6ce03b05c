//! Principal extraction and enforcement.

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use serde::Deserialize;

use super::{settings, Filter, FilterAction};
use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::http::GatewayResponse;

pub const AUTH_FILTER_ID: &str = "auth";

/// Attribute key holding the [`Principal`] of an authenticated request.
pub const PRINCIPAL_ATTRIBUTE: &str = "auth.principal";

/// Route settings for the auth filter.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthSettings {
    /// Reject requests without credentials.
    pub required: bool,
    /// Header carrying the credentials.
    pub header: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            required: false,
            header: "authorization".to_string(),
        }
    }
}

/// Identity presented by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// Stores the caller's principal; rejects with 401 when the route requires one.
#[derive(Debug, Default)]
pub struct AuthFilter;

#[async_trait]
impl Filter for AuthFilter {
    fn id(&self) -> &'static str {
        AUTH_FILTER_ID
    }

    fn order(&self) -> i32 {
        -100
    }

    async fn apply(&self, ctx: &mut GatewayContext) -> Result<FilterAction, GatewayError> {
        let settings: AuthSettings = settings(ctx, AUTH_FILTER_ID)?;

        let principal = ctx
            .request()
            .header(&settings.header)
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
            .filter(|v| !v.is_empty())
            .map(|v| Principal(v.to_string()));

        match principal {
            Some(principal) => {
                tracing::debug!(request_id = %ctx.unique_id(), principal = %principal.0, "Principal resolved");
                ctx.set_attribute(PRINCIPAL_ATTRIBUTE, principal);
                Ok(FilterAction::Continue)
            }
            None if settings.required => {
                let err = GatewayError::Unauthorized(format!("missing '{}' header", settings.header));
                tracing::info!(request_id = %ctx.unique_id(), rule = %ctx.rule().id(), "Rejecting unauthenticated request");
                ctx.set_response(
                    GatewayResponse::from_error(&err)
                        .with_header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")),
                );
                Ok(FilterAction::Halt)
            }
            None => Ok(FilterAction::Continue),
        }
    }
}
