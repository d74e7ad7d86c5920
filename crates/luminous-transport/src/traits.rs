// ============================================
// File: crates/luminous-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the two halves of a node stream as abstract interfaces so the
//! Stream Handler can be tested without a network.
//!
//! ## Main Functionality
//! - `StatusSource`: inbound half, yields `NodeStatusUpdate`s
//! - `CommandSink`: outbound half, accepts `ControlPlaneCommand`s
//! - Implementations over tonic's `Streaming` and the response channel
//!
//! ## Design Philosophy
//! - Traits enable mock implementations for testing
//! - Async-first design with `async_trait`
//! - The inbound half is owned by exactly one receive loop (`&mut self`)
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send for use across spawned tasks
//! - `Ok(None)` from `next_update` is a clean end of stream
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::{Status, Streaming};

use luminous_core::protocol::{ControlPlaneCommand, NodeStatusUpdate};

use crate::error::{Result, TransportError};

/// Sending half of a `StreamConnection` response channel.
pub type CommandSender = mpsc::Sender<std::result::Result<ControlPlaneCommand, Status>>;

// ============================================
// StatusSource Trait
// ============================================

/// Inbound half of a node stream.
#[async_trait]
pub trait StatusSource: Send {
    /// Waits for the next status update.
    ///
    /// # Returns
    /// - `Ok(Some(update))` for each message received
    /// - `Ok(None)` once the node has finished sending
    ///
    /// # Errors
    /// Returns error if the stream broke
    async fn next_update(&mut self) -> Result<Option<NodeStatusUpdate>>;
}

// ============================================
// CommandSink Trait
// ============================================

/// Outbound half of a node stream.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Writes one command to the node.
    ///
    /// # Errors
    /// Returns `StreamClosed` if the node is no longer listening
    async fn send_command(&self, command: ControlPlaneCommand) -> Result<()>;

    /// Waits until the sink can take a command without blocking.
    ///
    /// Callers holding their own bounded queue check this before taking
    /// the next command off it, so commands stay in that queue while the
    /// node is not reading.
    ///
    /// # Errors
    /// Returns `StreamClosed` if the node is no longer listening
    async fn ready(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================
// tonic Implementations
// ============================================

#[async_trait]
impl StatusSource for Streaming<NodeStatusUpdate> {
    async fn next_update(&mut self) -> Result<Option<NodeStatusUpdate>> {
        self.message()
            .await
            .map_err(|status| TransportError::from_status(&status))
    }
}

#[async_trait]
impl CommandSink for CommandSender {
    async fn send_command(&self, command: ControlPlaneCommand) -> Result<()> {
        self.send(Ok(command))
            .await
            .map_err(|_| TransportError::StreamClosed)
    }

    async fn ready(&self) -> Result<()> {
        // Single producer, so the freed slot is still there for the send
        self.reserve()
            .await
            .map(drop)
            .map_err(|_| TransportError::StreamClosed)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sender_sink_delivers() {
        let (tx, mut rx) = mpsc::channel(4);

        let command = ControlPlaneCommand {
            command_id: "cmd-1".into(),
            ..Default::default()
        };
        tx.send_command(command.clone()).await.unwrap();

        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received, command);
    }

    #[tokio::test]
    async fn test_sender_sink_ready_waits_for_room() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send_command(ControlPlaneCommand::default()).await.unwrap();

        let pending = tokio::time::timeout(std::time::Duration::from_millis(50), tx.ready()).await;
        assert!(pending.is_err());

        rx.recv().await.unwrap().unwrap();
        tx.ready().await.unwrap();

        drop(rx);
        assert!(tx.ready().await.unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn test_sender_sink_reports_closed() {
        let (tx, rx) = mpsc::channel::<std::result::Result<ControlPlaneCommand, Status>>(4);
        drop(rx);

        let err = tx
            .send_command(ControlPlaneCommand::default())
            .await
            .unwrap_err();
        assert!(err.is_disconnect());
    }
}
