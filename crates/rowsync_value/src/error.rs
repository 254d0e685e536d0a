//! Error types for value conversion.

use thiserror::Error;

/// Result type for value conversions.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur when converting values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The float cannot be represented in a field map.
    #[error("non-finite float: {0}")]
    NonFinite(f64),

    /// The value has a different type than requested.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type name.
        expected: &'static str,
        /// Actual type name.
        found: &'static str,
    },
}
