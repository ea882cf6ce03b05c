//! Per-request context core of an API gateway, with the HTTP front end,
//! rule router and filter pipeline that drive it.

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use context::{GatewayContext, GatewayContextBuilder};
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
