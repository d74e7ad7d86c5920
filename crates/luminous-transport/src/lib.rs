// ============================================
// File: crates/luminous-transport/src/lib.rs
// ============================================
//! # Luminous Transport - Stream Seams & TLS
//!
//! ## Creation Reason
//! Keeps the Stream Handler independent of tonic's concrete stream types
//! so the per-node protocol engine can be driven by an in-memory pair in
//! tests and by a live gRPC stream in production.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `StatusSource` / `CommandSink` seams and their tonic impls
//! - [`mock`]: in-memory status feed and capturing command sink
//! - [`tls`]: server certificate/key loading for the gRPC listener
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              luminous-server                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   luminous-core        luminous-transport          │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │            luminous-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Node                                │
//! │          │                              ▲                │
//! │   NodeStatusUpdate               ControlPlaneCommand     │
//! │          ▼                              │                │
//! │  ┌───────────────┐              ┌───────────────┐        │
//! │  │ StatusSource  │              │  CommandSink  │        │
//! │  │ (Streaming<_>)│              │  (mpsc::Sender)│       │
//! │  └───────┬───────┘              └───────▲───────┘        │
//! │          │                              │                │
//! │          └────────► StreamHandler ──────┘                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `StatusSource::next_update` returning `Ok(None)` means a clean end of
//!   stream, not an error
//! - The mock types are for tests only
//!
//! ## Last Modified
//! v0.1.0 - Initial transport seams

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mock;
pub mod tls;
pub mod traits;

// Re-exports
pub use error::{Result, TransportError};
pub use mock::{MockCommandSink, MockStatusFeed, MockStatusSource};
pub use tls::TlsMaterial;
pub use traits::{CommandSink, CommandSender, StatusSource};
