//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! TCP accept (axum::serve)
//!     → connection.rs (assign ConnectionId, capture peer address)
//!     → TransportHandle cloned into every request on the connection
//!     → carried by GatewayContext to the write-back stage
//! ```

pub mod connection;

pub use connection::{ConnectionId, TransportHandle};
