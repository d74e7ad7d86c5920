// ============================================
// File: crates/luminous-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the trust primitives of the control plane behind two small
//! types so the server never touches X.509 or JWT details directly.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`ca`]: `CertificateAuthority` (load, sign CSR, validate certificate)
//! - [`token`]: `TokenCodec` (issue and verify HS256 bearer tokens)
//!
//! ## Trust Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Registration                             │
//! │  Node                                     Control Plane     │
//! │    │                                              │         │
//! │    │  CSR (self-signed) ─────────────────────────►│         │
//! │    │                        verify self-signature │         │
//! │    │                        sign with CA key      │         │
//! │    │ ◄───────────────────────── leaf certificate  │         │
//! │    │ ◄───────────────────────── bearer token      │         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Authentication                           │
//! │                                                             │
//! │   token ──► HS256 verify ──► node_id claim == caller        │
//! │   cert  ──► CA signature ──► NotBefore <= now <= NotAfter   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - CA material is loaded once; there is no hot-reload
//! - Token validity is always derived from the token itself
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod ca;
pub mod token;

pub use ca::{generate_serial_number, load_ca, CertificateAuthority, CertificateInfo};
pub use token::{IssuedToken, TokenClaims, TokenCodec};

// ============================================
// Constants
// ============================================

/// Validity of an issued node certificate: one year.
pub const NODE_CERT_VALIDITY_SECS: i64 = 365 * 24 * 60 * 60;

/// Default bearer token lifetime: 24 hours.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;
