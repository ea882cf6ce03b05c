//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (host, path)
//!     → router.rs (rule lookup over the current rule set)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: Arc<Rule> or no match
//!
//! Rule Compilation (at startup and on reload):
//!     RuleConfig[]
//!     → rule.rs (index filter configs, build matchers)
//!     → Sort by priority, then prefix length
//!     → Publish as an immutable set
//! ```
//!
//! # Design Decisions
//! - Rules compiled ahead of time, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same rule
//! - First match wins

pub mod matcher;
pub mod router;
pub mod rule;

pub use router::RuleRouter;
pub use rule::{FilterConfig, Rule};
