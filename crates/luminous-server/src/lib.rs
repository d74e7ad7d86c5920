// ============================================
// File: crates/luminous-server/src/lib.rs
// ============================================
//! # Luminous Mesh Control Plane
//!
//! ## Creation Reason
//! Server side of the node trust-and-session subsystem: nodes bootstrap
//! an identity here, authenticate, hold sessions and keep a command
//! stream open.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Main server orchestration
//! - [`services`]: Business logic services
//!   - [`services::auth`]: Certificates and bearer tokens
//!   - [`services::registry`]: Nodes and session leases
//! - [`handlers`]: Per-node stream handling
//! - [`grpc`]: `NodeService` and its interceptors
//! - [`metrics`]: Node metrics sink
//! - [`plugins`]: Gateway and data-store backends
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Luminous Mesh Control Plane                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│   Server    │────►│  NodeService    │    │
//! │  │             │     │ Orchestrator│     │  (+ AuthGate)   │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! │         ┌───────────────────┼─────────────────────┤             │
//! │         ▼                   ▼                     ▼             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Plugins   │     │ AuthManager │     │  StreamHandler  │    │
//! │  │             │     │ NodeRegistry│◄────│  (per node)     │    │
//! │  └─────────────┘     └─────────────┘     └────────┬────────┘    │
//! │                                                   ▼             │
//! │                                          ┌─────────────────┐    │
//! │                                          │   MetricsSink   │    │
//! │                                          └─────────────────┘    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                             │
//! │          TLS identity · StatusSource · CommandSink              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Node Flow
//! ```text
//! RegisterNode → Authenticate → StreamConnection ⇄ … → RotateToken (periodic)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All node state is in memory and single-instance
//! - Configuration changes require restart (no hot-reload)
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod metrics;
pub mod plugins;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
