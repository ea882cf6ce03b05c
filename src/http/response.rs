//! Response value produced by the filter pipeline.
//!
//! # Responsibilities
//! - Hold status, headers and a fully buffered body
//! - Map gateway errors to JSON error responses
//! - Strip hop-by-hop headers from upstream responses
//!
//! # Design Decisions
//! - Bodies are buffered `Bytes`; the pipeline may overwrite a response
//!   several times before write-back
//! - Error bodies share one shape: `{"error": {"code", "message"}}`

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::GatewayError;

/// Hop-by-hop headers that must not be forwarded.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
];

/// Returns true for headers that only apply to a single transport hop.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str()) || name == header::UPGRADE
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl GatewayResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 200 with a plain-text body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .with_body(body)
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(value.to_string())
    }

    /// Wrap a backend response, dropping hop-by-hop headers.
    ///
    /// `Content-Length` is recomputed from the buffered body, except in
    /// answer to HEAD: there it describes the entity and is passed through.
    pub fn from_upstream(method: &Method, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        let keep_length = *method == Method::HEAD;
        let mut filtered = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            if is_hop_by_hop(name) || (name == header::CONTENT_LENGTH && !keep_length) {
                continue;
            }
            filtered.append(name.clone(), value.clone());
        }
        Self {
            status,
            headers: filtered,
            body,
        }
    }

    /// Error response for a pipeline failure.
    pub fn from_error(err: &GatewayError) -> Self {
        Self::json(
            err.status_code(),
            &json!({
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                }
            }),
        )
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
