//! Errors raised by the gateway context itself.

use thiserror::Error;

/// A context could not be assembled because a required input was never set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cannot build gateway context: `{field}` is required")]
    MissingField { field: &'static str },
}

impl ValidationError {
    /// Name of the field that was missing.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingField { field } => field,
        }
    }
}

/// An inter-filter data contract was broken.
///
/// Both variants point at a pipeline ordering or configuration defect,
/// never at a transient condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// A filter required a key no earlier filter populated.
    #[error("required attribute '{key}' is missing")]
    Missing { key: String },

    /// The key holds a value of a different type than the caller asked for.
    #[error("attribute '{key}' holds a {found}, not a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl AttributeError {
    pub fn key(&self) -> &str {
        match self {
            AttributeError::Missing { key } | AttributeError::TypeMismatch { key, .. } => key,
        }
    }
}
