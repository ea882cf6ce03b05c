//! Per-request attribute store.
//!
//! Scratch space filters use to hand derived values to later filters
//! (a resolved backend, an authenticated principal, a deadline override).
//! Values are type-erased; every read checks the type at runtime and
//! reports a mismatch instead of trusting the caller.

use std::any::{type_name, Any};
use std::collections::HashMap;

use super::error::AttributeError;

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Mapping from string key to a value of any `Send + Sync` type.
///
/// Owned by exactly one context and never shared. No interior locking:
/// writers go through `&mut`.
#[derive(Default)]
pub struct Attributes {
    entries: HashMap<String, Entry>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(
            key.into(),
            Entry {
                value: Box::new(value),
                type_name: type_name::<T>(),
            },
        );
    }

    /// The most recent value for `key`, or `None` if it was never set.
    pub fn get<T: Any>(&self, key: &str) -> Result<Option<&T>, AttributeError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        entry
            .value
            .downcast_ref::<T>()
            .map(Some)
            .ok_or_else(|| AttributeError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
                found: entry.type_name,
            })
    }

    /// The value for `key`; absence is a contract violation.
    pub fn require<T: Any>(&self, key: &str) -> Result<&T, AttributeError> {
        self.get(key)?.ok_or_else(|| AttributeError::Missing {
            key: key.to_string(),
        })
    }

    /// The value for `key`, or `default` when absent. Never fails: a value of
    /// the wrong type also yields `default`, with a warning.
    pub fn get_or<T: Any + Clone>(&self, key: &str, default: T) -> T {
        match self.get::<T>(key) {
            Ok(Some(value)) => value.clone(),
            Ok(None) => default,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Attribute type mismatch, using default");
                default
            }
        }
    }

    /// Remove `key`, returning true if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, e)| (k, e.type_name)))
            .finish()
    }
}
