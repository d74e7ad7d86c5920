// ============================================
// File: crates/luminous-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Provides foundational error types and result aliases used across
//! all Luminous Mesh crates, enabling consistent error handling.
//!
//! ## Main Functionality
//! - `CommonError`: Identifier validation failures
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## Design Philosophy
//! - Use `thiserror` for ergonomic error definitions
//! - Each crate defines its own error type that wraps `CommonError`
//! - Errors should be informative without leaking secrets
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include tokens, keys or secrets in error messages
//! - Keep error variants specific but not too granular
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across Luminous Mesh crates.
///
/// Only identifier validation lives here; everything else belongs to the
/// crate that owns the failing operation.
///
/// # Example
/// ```
/// use luminous_common::error::{CommonError, Result};
///
/// fn validate_hostname(name: &str) -> Result<()> {
///     if name.is_empty() {
///         return Err(CommonError::invalid_input("hostname", "cannot be empty"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates a client mistake.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_input("node_id", "cannot be empty");
        assert!(err.to_string().contains("node_id"));
        assert!(err.to_string().contains("cannot be empty"));
        assert!(err.is_client_error());
    }
}
