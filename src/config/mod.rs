//! Gateway configuration.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs     (read + toml/serde)
//!     → validation.rs (every semantic issue collected at once)
//!     → GatewayConfig
//!
//! watcher.rs (notify) on save:
//!     → loader.rs again → mpsc → GatewayServer → RuleRouter::reload
//! ```
//!
//! # Design Decisions
//! - Every section has defaults, so an empty file is a valid config
//! - Only rules are hot-reloaded; listener, timeouts and observability
//!   apply at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, RuleConfig, TimeoutConfig};
pub use validation::ConfigIssue;
pub use watcher::{ConfigWatcher, ReloadOutcome};
