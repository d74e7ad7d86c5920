// ============================================
// File: crates/luminous-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for stream I/O and TLS material loading.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Conversion from `tonic::Status` and I/O errors
//! - Categorization of disconnects vs. startup failures
//!
//! ## Error Categories
//! 1. **Stream Errors**: peer gone, receive/send failures
//! 2. **TLS Errors**: unreadable or malformed certificate/key files
//! 3. **System Errors**: I/O with context
//!
//! ## ⚠️ Important Note for Next Developer
//! - Stream errors end exactly one node's stream, never the process
//! - TLS errors only happen at startup and are fatal there
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Stream Errors
    // ========================================

    /// The other side of the stream has gone away.
    #[error("Stream closed")]
    StreamClosed,

    /// Receiving from the stream failed.
    #[error("Failed to receive: {reason}")]
    ReceiveFailed {
        /// Why receive failed
        reason: String,
    },

    /// Sending on the stream failed.
    #[error("Failed to send: {reason}")]
    SendFailed {
        /// Why send failed
        reason: String,
    },

    // ========================================
    // TLS Errors
    // ========================================

    /// Certificate or key file could not be used.
    #[error("TLS material error for {path}: {reason}")]
    TlsMaterial {
        /// Offending file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `ReceiveFailed` error.
    pub fn receive_failed(reason: impl Into<String>) -> Self {
        Self::ReceiveFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `SendFailed` error.
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `TlsMaterial` error.
    pub fn tls_material(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::TlsMaterial {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Maps a status received from the peer's stream.
    ///
    /// A cancelled call is the peer hanging up, not a protocol failure.
    #[must_use]
    pub fn from_status(status: &tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Cancelled => Self::StreamClosed,
            code => Self::receive_failed(format!("{code:?}: {}", status.message())),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the error means the peer went away.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::StreamClosed)
    }

    /// Returns `true` if this error can only occur during startup.
    #[must_use]
    pub const fn is_startup_error(&self) -> bool {
        matches!(self, Self::TlsMaterial { .. })
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
