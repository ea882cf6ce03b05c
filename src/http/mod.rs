//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs  (Axum setup, request ID, body collection)
//!     → request.rs (decode into GatewayRequest with a releasable buffer)
//!     → [routing resolves the rule, context is built]
//!     → [filter chain runs]
//!     → response.rs (GatewayResponse written back)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{is_keep_alive, GatewayRequest, InboundBuffer, X_REQUEST_ID};
pub use response::GatewayResponse;
pub use server::GatewayServer;
