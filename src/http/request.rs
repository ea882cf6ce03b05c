//! Decoded inbound request handed to the gateway context.
//!
//! # Responsibilities
//! - Carry the correlation ID (from `x-request-id`, or a fresh UUID v4)
//! - Keep method, URI, version and headers immutable after decoding
//! - Hold the inbound body in a releasable buffer
//! - Decide HTTP keep-alive from version and `Connection` header
//!
//! # Design Decisions
//! - The body is `Bytes`, so forwarding clones a reference instead of copying
//! - Releasing drops the gateway's reference; in-flight clones stay valid
//! - Release counting makes the exactly-once contract observable

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri, Version};

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The inbound body buffer of one request.
#[derive(Debug)]
pub struct InboundBuffer {
    bytes: Mutex<Option<Bytes>>,
    len: usize,
    release_count: AtomicUsize,
}

impl InboundBuffer {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            len: bytes.len(),
            bytes: Mutex::new(Some(bytes)),
            release_count: AtomicUsize::new(0),
        }
    }

    /// A reference to the held bytes, or `None` once released.
    pub fn bytes(&self) -> Option<Bytes> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Size of the body as received.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_released(&self) -> bool {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Drop the held bytes. Returns the number of bytes let go.
    ///
    /// Callers are expected to go through the context's release guard;
    /// this routine itself does not deduplicate.
    pub fn release(&self) -> usize {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        let taken = self
            .bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        taken.map(|b| b.len()).unwrap_or(0)
    }

    /// How many times `release` has run.
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }
}

/// Immutable decoded request.
#[derive(Debug)]
pub struct GatewayRequest {
    unique_id: String,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    buffer: InboundBuffer,
    received_at: Instant,
}

impl GatewayRequest {
    /// Build from decoded request parts and the collected body.
    pub fn new(parts: Parts, body: Bytes) -> Self {
        let unique_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            unique_id,
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            buffer: InboundBuffer::new(body),
            received_at: Instant::now(),
        }
    }

    /// Correlation ID used across log and trace events.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Host from the `Host` header, falling back to the URI authority.
    /// Any port suffix is stripped; IPv6 literals keep their brackets.
    pub fn host(&self) -> Option<&str> {
        let raw = self.header(header::HOST.as_str()).or_else(|| self.uri.host())?;
        Some(strip_port(raw))
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// The body, or `None` once the buffer has been released.
    pub fn body(&self) -> Option<Bytes> {
        self.buffer.bytes()
    }

    pub fn buffer(&self) -> &InboundBuffer {
        &self.buffer
    }

    /// Whether the client asked for a persistent connection.
    pub fn keep_alive(&self) -> bool {
        is_keep_alive(self.version, &self.headers)
    }
}

fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => authority,
    }
}

/// HTTP/1.1 persists unless `Connection: close`; HTTP/1.0 only with
/// `Connection: keep-alive`. HTTP/2 and later always multiplex.
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let connection_has = |token: &str| {
        headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    };

    match version {
        Version::HTTP_09 => false,
        Version::HTTP_10 => connection_has("keep-alive"),
        Version::HTTP_11 => !connection_has("close"),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn unique_id_taken_from_header() {
        let p = parts(Request::builder().uri("/a").header(X_REQUEST_ID, "req-42"));
        let req = GatewayRequest::new(p, Bytes::new());
        assert_eq!(req.unique_id(), "req-42");
    }

    #[test]
    fn unique_id_generated_when_missing() {
        let a = GatewayRequest::new(parts(Request::builder().uri("/a")), Bytes::new());
        let b = GatewayRequest::new(parts(Request::builder().uri("/a")), Bytes::new());
        assert!(uuid::Uuid::parse_str(a.unique_id()).is_ok());
        assert_ne!(a.unique_id(), b.unique_id());
    }

    #[test]
    fn host_strips_port() {
        let p = parts(Request::builder().uri("/x?y=1").header("Host", "api.example.com:8443"));
        let req = GatewayRequest::new(p, Bytes::new());
        assert_eq!(req.host(), Some("api.example.com"));
        assert_eq!(req.path(), "/x");
        assert_eq!(req.path_and_query(), "/x?y=1");

        let p = parts(Request::builder().uri("/").header("Host", "[::1]:8080"));
        assert_eq!(GatewayRequest::new(p, Bytes::new()).host(), Some("[::1]"));

        let p = parts(Request::builder().uri("/").header("Host", "[2001:db8::7]"));
        assert_eq!(GatewayRequest::new(p, Bytes::new()).host(), Some("[2001:db8::7]"));

        let p = parts(Request::builder().uri("/").header("Host", "localhost"));
        assert_eq!(GatewayRequest::new(p, Bytes::new()).host(), Some("localhost"));
    }

    #[test]
    fn keep_alive_rules() {
        let mut headers = HeaderMap::new();
        assert!(is_keep_alive(Version::HTTP_11, &headers));
        assert!(!is_keep_alive(Version::HTTP_10, &headers));
        assert!(is_keep_alive(Version::HTTP_2, &headers));

        headers.insert(header::CONNECTION, "Close".parse().unwrap());
        assert!(!is_keep_alive(Version::HTTP_11, &headers));

        headers.insert(header::CONNECTION, "Upgrade, keep-alive".parse().unwrap());
        assert!(is_keep_alive(Version::HTTP_10, &headers));
    }

    #[test]
    fn buffer_release_drops_bytes() {
        let buffer = InboundBuffer::new(Bytes::from_static(b"payload"));
        let held = buffer.bytes().unwrap();

        assert_eq!(buffer.release(), 7);
        assert!(buffer.is_released());
        assert!(buffer.bytes().is_none());
        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.release_count(), 1);
        // Clones taken before release stay valid.
        assert_eq!(&held[..], b"payload");
    }
}
