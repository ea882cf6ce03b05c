//! Connection-level facts shared by every request context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::net::TransportHandle;

/// Wire protocol a request is served over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
    #[serde(rename = "websocket")]
    WebSocket,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "websocket" | "ws" => Ok(Protocol::WebSocket),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}

/// Protocol, transport handle and keep-alive flag, fixed at construction.
///
/// Embedded by value in `GatewayContext`.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    protocol: Protocol,
    transport: TransportHandle,
    keep_alive: bool,
}

impl ConnectionContext {
    pub fn new(protocol: Protocol, transport: TransportHandle, keep_alive: bool) -> Self {
        Self {
            protocol,
            transport,
            keep_alive,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}
