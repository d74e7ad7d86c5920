// ============================================
// File: crates/luminous-server/src/handlers/mod.rs
// ============================================
//! # Stream Handlers
//!
//! ## Creation Reason
//! Runs the per-node side of the long-lived `StreamConnection` channel.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`stream`]: Status intake and command delivery for one node
//!
//! ## Data Flow
//! ```text
//! Node → Control plane:
//!   1. Receive NodeStatusUpdate
//!   2. Store status in the NodeRegistry
//!   3. Project resources and task counters onto the MetricsSink
//!
//! Control plane → Node:
//!   1. dispatch_command enqueues onto the bounded queue
//!   2. Send loop drains the queue onto the stream
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One handler per open stream; they share nothing but the registry
//!   and the metrics sink
//! - A failing stream must only end its own handler
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod stream;

pub use stream::StreamHandler;
