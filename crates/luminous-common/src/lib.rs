// ============================================
// File: crates/luminous-common/src/lib.rs
// ============================================
//! # Luminous Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all Luminous Mesh
//! control-plane crates, so identifiers and clocks mean the same thing
//! everywhere.
//!
//! ## Main Functionality
//! - [`types`]: Identifier newtypes (`NodeId`, `SessionId`)
//! - [`time`]: Unix clock helpers used for token and certificate windows
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              luminous-server                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   luminous-core       luminous-transport           │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │            luminous-common  ◄── You are here      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - Identifiers travel as strings on the wire; keep `Display` stable
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{NodeId, SessionId};
