// ============================================
// File: crates/luminous-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types specific to CA, certificate and token operations
//! in the Luminous core crate.
//!
//! ## Error Categories
//! 1. **CA Errors**: Unreadable or malformed CA material, signing failures
//! 2. **Certificate Errors**: Forged CSRs, untrusted or out-of-window certificates
//! 3. **Token Errors**: Bad signatures, expired tokens, identity mismatch
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or token text in error messages
//! - `is_fatal` decides whether startup aborts; keep it narrow
//! - `is_auth_failure` errors are answered, not propagated, by the RPC layer
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use luminous_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for trust operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Certificate Authority Errors
    // ========================================

    /// CA certificate or key could not be read or decoded.
    #[error("CA material error for '{source_name}': {reason}")]
    CaMaterial {
        /// File path or label of the offending material
        source_name: String,
        /// What went wrong
        reason: String,
    },

    /// A cryptographic step of certificate issuing failed.
    #[error("CA signing failed: {reason}")]
    CaSigning {
        /// Why signing failed
        reason: String,
    },

    // ========================================
    // Certificate Errors
    // ========================================

    /// CSR is malformed or its self-signature does not verify.
    #[error("Invalid CSR: {reason}")]
    InvalidCsr {
        /// What's wrong with the request
        reason: String,
    },

    /// Presented certificate could not be decoded.
    #[error("Invalid certificate: {reason}")]
    InvalidCertificate {
        /// What's wrong with the certificate
        reason: String,
    },

    /// Certificate does not chain to our CA.
    #[error("Certificate is not signed by the control-plane CA")]
    UntrustedCertificate,

    /// Current time is after the certificate's `NotAfter`.
    #[error("Certificate expired at {not_after}")]
    CertificateExpired {
        /// Unix time the certificate stopped being valid
        not_after: i64,
    },

    /// Current time is before the certificate's `NotBefore`.
    #[error("Certificate not valid before {not_before}")]
    CertificateNotYetValid {
        /// Unix time the certificate becomes valid
        not_before: i64,
    },

    // ========================================
    // Token Errors
    // ========================================

    /// Token could not be signed (e.g. secret not configured).
    #[error("Token signing failed: {reason}")]
    TokenSigning {
        /// Why signing failed
        reason: String,
    },

    /// Token signature, algorithm or structure is invalid.
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// What failed during verification
        reason: String,
    },

    /// Token's `exp` claim has passed.
    #[error("Token expired")]
    TokenExpired,

    /// Token was superseded by a rotation and revoked.
    #[error("Token revoked")]
    TokenRevoked,

    /// Token is valid but was issued to a different node.
    #[error("Token node ID mismatch")]
    NodeMismatch,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `CaMaterial` error.
    pub fn ca_material(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CaMaterial {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `CaSigning` error.
    pub fn ca_signing(reason: impl Into<String>) -> Self {
        Self::CaSigning {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidCsr` error.
    pub fn invalid_csr(reason: impl Into<String>) -> Self {
        Self::InvalidCsr {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidCertificate` error.
    pub fn invalid_certificate(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate {
            reason: reason.into(),
        }
    }

    /// Creates a `TokenSigning` error.
    pub fn token_signing(reason: impl Into<String>) -> Self {
        Self::TokenSigning {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidToken` error.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error must abort startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CaMaterial { .. })
    }

    /// Returns `true` if the caller failed to prove its identity.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. }
                | Self::TokenExpired
                | Self::TokenRevoked
                | Self::NodeMismatch
                | Self::UntrustedCertificate
                | Self::CertificateExpired { .. }
                | Self::CertificateNotYetValid { .. }
                | Self::InvalidCertificate { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack.
    ///
    /// These warrant a `warn!` rather than a `debug!`.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::InvalidCsr { .. }
                | Self::UntrustedCertificate
                | Self::NodeMismatch
                | Self::TokenRevoked
        )
    }
}

// ============================================
// Tests
// ============================================
