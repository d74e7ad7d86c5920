// ============================================
// File: crates/luminous-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Holds the business logic shared by every RPC and stream, separated
//! from the gRPC surface and the wire types' transport concerns.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`auth`]: CA-backed credentials (certificates and bearer tokens)
//! - [`registry`]: In-memory node directory and session leases
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐        ┌───────────────────────────┐  │
//! │  │   AuthManager    │        │       NodeRegistry        │  │
//! │  │                  │        │  - Node records           │  │
//! │  │  - Sign CSRs     │        │  - Session leases (TTL)   │  │
//! │  │  - Verify certs  │        │  - Status from streams    │  │
//! │  │  - Issue tokens  │        │                           │  │
//! │  └──────────────────┘        └───────────────────────────┘  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both services are shared behind `Arc` by every connection task
//! - Neither service talks to the network; the gRPC layer composes them
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod auth;
pub mod registry;

pub use auth::AuthManager;
pub use registry::{Node, NodeRegistry};
