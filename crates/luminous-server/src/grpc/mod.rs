// ============================================
// File: crates/luminous-server/src/grpc/mod.rs
// ============================================
//! # gRPC Surface
//!
//! ## Creation Reason
//! Exposes the control plane to nodes over tonic.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`service`]: `NodeService` implementation
//! - [`interceptors`]: Auth gate and call logging
//!
//! ## Request Path
//! ```text
//! TLS ──► tonic router ──► NodeService method
//!                              │
//!                              ├─ CallLog::start
//!                              ├─ AuthGate::check (all but RegisterNode)
//!                              ├─ business logic
//!                              └─ CallLog::finish
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial gRPC surface

pub mod interceptors;
pub mod service;

pub use interceptors::{AuthGate, CallLog};
pub use service::{ControlPlaneService, StreamLimits};
