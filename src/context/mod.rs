//! Per-request context subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayRequest + Arc<Rule> + TransportHandle
//!     → builder.rs (validate every required input)
//!     → gateway.rs (GatewayContext, fully constructed)
//!     → filters read config, exchange attributes, set the response
//!     → release_request() from whichever path concludes the request
//! ```
//!
//! # Design Decisions
//! - Composition over inheritance: connection facts live in an embedded
//!   `ConnectionContext`
//! - Attributes are type-erased but type-checked on every read
//! - Only the release guard is shared mutable state

pub mod attributes;
pub mod builder;
pub mod connection;
pub mod error;
pub mod gateway;

pub use attributes::Attributes;
pub use builder::GatewayContextBuilder;
pub use connection::{ConnectionContext, Protocol};
pub use error::{AttributeError, ValidationError};
pub use gateway::{GatewayContext, ReleaseHandle};
