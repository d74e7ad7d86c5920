// ============================================
// File: crates/luminous-transport/src/mock.rs
// ============================================
//! # Mock Stream Implementation
//!
//! ## Creation Reason
//! Provides an in-memory node stream for testing the Stream Handler
//! without a gRPC server, TLS material or sockets.
//!
//! ## Main Functionality
//! - `MockStatusSource` / `MockStatusFeed`: a status source and the handle
//!   a test uses to push updates, inject a receive failure, or end the stream
//! - `MockCommandSink`: captures commands; can be told to stall or fail
//!
//! ## Usage in Tests
//! ```
//! use luminous_transport::mock::MockStatusSource;
//! use luminous_transport::traits::StatusSource;
//! use luminous_core::protocol::NodeStatusUpdate;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (mut source, feed) = MockStatusSource::new();
//! feed.push(NodeStatusUpdate::default());
//! feed.finish();
//!
//! assert!(source.next_update().await.unwrap().is_some());
//! assert!(source.next_update().await.unwrap().is_none());
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - A stalled sink never completes a send; pair it with a timeout
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use luminous_core::protocol::{ControlPlaneCommand, NodeStatusUpdate};

use crate::error::{Result, TransportError};
use crate::traits::{CommandSink, StatusSource};

// ============================================
// Constants
// ============================================

/// Maximum number of queued inbound events.
const MAX_QUEUE_SIZE: usize = 1000;

// ============================================
// MockStatusSource
// ============================================

enum FeedEvent {
    Update(NodeStatusUpdate),
    Fail(String),
}

#[derive(Default)]
struct FeedState {
    queue: Mutex<VecDeque<FeedEvent>>,
    finished: AtomicBool,
    notify: Notify,
}

/// Status source fed from a test.
pub struct MockStatusSource {
    state: Arc<FeedState>,
}

/// Test-side handle of a [`MockStatusSource`].
#[derive(Clone)]
pub struct MockStatusFeed {
    state: Arc<FeedState>,
}

impl MockStatusSource {
    /// Creates a connected source/feed pair.
    #[must_use]
    pub fn new() -> (Self, MockStatusFeed) {
        let state = Arc::new(FeedState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            MockStatusFeed { state },
        )
    }
}

impl MockStatusFeed {
    fn enqueue(&self, event: FeedEvent) {
        let mut queue = self.state.queue.lock();
        assert!(queue.len() < MAX_QUEUE_SIZE, "Mock status queue overflow");
        queue.push_back(event);
        drop(queue);
        self.state.notify.notify_one();
    }

    /// Queues an update for the receive loop.
    ///
    /// # Panics
    /// Panics if more than `MAX_QUEUE_SIZE` events are pending.
    pub fn push(&self, update: NodeStatusUpdate) {
        self.enqueue(FeedEvent::Update(update));
    }

    /// Queues a receive failure; it is returned after earlier updates.
    ///
    /// # Panics
    /// Panics if more than `MAX_QUEUE_SIZE` events are pending.
    pub fn fail(&self, reason: impl Into<String>) {
        self.enqueue(FeedEvent::Fail(reason.into()));
    }

    /// Ends the stream once the queue drains.
    pub fn finish(&self) {
        self.state.finished.store(true, Ordering::Release);
        self.state.notify.notify_one();
    }

    /// Returns the number of events not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.queue.lock().len()
    }
}

#[async_trait]
impl StatusSource for MockStatusSource {
    async fn next_update(&mut self) -> Result<Option<NodeStatusUpdate>> {
        loop {
            {
                let mut queue = self.state.queue.lock();
                match queue.pop_front() {
                    Some(FeedEvent::Update(update)) => return Ok(Some(update)),
                    Some(FeedEvent::Fail(reason)) => {
                        return Err(TransportError::receive_failed(reason))
                    }
                    None if self.state.finished.load(Ordering::Acquire) => return Ok(None),
                    None => {}
                }
            }

            // Wait for the feed to push or finish
            self.state.notify.notified().await;
        }
    }
}

impl std::fmt::Debug for MockStatusSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStatusSource")
            .field("pending", &self.state.queue.lock().len())
            .field("finished", &self.state.finished.load(Ordering::Acquire))
            .finish()
    }
}

// ============================================
// MockCommandSink
// ============================================

#[derive(Default)]
struct SinkState {
    sent: Mutex<Vec<ControlPlaneCommand>>,
    stalled: AtomicBool,
    failing: AtomicBool,
    sent_notify: Notify,
}

/// Command sink that records what it is given.
///
/// Clones share state, so a test keeps one clone and hands the other
/// to the code under test.
#[derive(Clone, Default)]
pub struct MockCommandSink {
    state: Arc<SinkState>,
}

impl MockCommandSink {
    /// Creates an empty, healthy sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send hang forever.
    pub fn stall(&self) {
        self.state.stalled.store(true, Ordering::Release);
    }

    /// Makes every subsequent send fail with `StreamClosed`.
    pub fn fail(&self) {
        self.state.failing.store(true, Ordering::Release);
    }

    /// Returns the commands captured so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<ControlPlaneCommand> {
        self.state.sent.lock().clone()
    }

    /// Returns the number of captured commands.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.state.sent.lock().len()
    }

    /// Waits until at least `count` commands have been captured.
    pub async fn wait_for(&self, count: usize) -> Vec<ControlPlaneCommand> {
        loop {
            let notified = self.state.sent_notify.notified();
            {
                let sent = self.state.sent.lock();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl CommandSink for MockCommandSink {
    async fn send_command(&self, command: ControlPlaneCommand) -> Result<()> {
        if self.state.failing.load(Ordering::Acquire) {
            return Err(TransportError::StreamClosed);
        }
        if self.state.stalled.load(Ordering::Acquire) {
            std::future::pending::<()>().await;
        }

        self.state.sent.lock().push(command);
        self.state.sent_notify.notify_waiters();
        Ok(())
    }
}

impl std::fmt::Debug for MockCommandSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCommandSink")
            .field("sent", &self.sent_count())
            .field("stalled", &self.state.stalled.load(Ordering::Acquire))
            .field("failing", &self.state.failing.load(Ordering::Acquire))
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn command(id: &str) -> ControlPlaneCommand {
        ControlPlaneCommand {
            command_id: id.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_source_yields_in_order_then_ends() {
        let (mut source, feed) = MockStatusSource::new();

        let mut first = NodeStatusUpdate::default();
        first.metrics.push(Default::default());
        feed.push(first.clone());
        feed.push(NodeStatusUpdate::default());
        feed.finish();
        assert_eq!(feed.pending(), 2);

        assert_eq!(source.next_update().await.unwrap(), Some(first));
        assert_eq!(
            source.next_update().await.unwrap(),
            Some(NodeStatusUpdate::default())
        );
        assert_eq!(source.next_update().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_source_waits_for_feed() {
        let (mut source, feed) = MockStatusSource::new();

        let reader = tokio::spawn(async move { source.next_update().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.push(NodeStatusUpdate::default());

        let got = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn test_source_failure() {
        let (mut source, feed) = MockStatusSource::new();
        feed.fail("connection reset");

        let err = source.next_update().await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_sink_captures() {
        let sink = MockCommandSink::new();
        sink.send_command(command("a")).await.unwrap();
        sink.send_command(command("b")).await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].command_id, "a");
        assert_eq!(sent[1].command_id, "b");
    }

    #[tokio::test]
    async fn test_sink_wait_for() {
        let sink = MockCommandSink::new();
        let writer = sink.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.send_command(command("late")).await.unwrap();
        });

        let sent = tokio::time::timeout(Duration::from_secs(1), sink.wait_for(1))
            .await
            .unwrap();
        assert_eq!(sent[0].command_id, "late");
    }

    #[tokio::test]
    async fn test_sink_stall_and_fail() {
        let sink = MockCommandSink::new();

        sink.stall();
        let stalled =
            tokio::time::timeout(Duration::from_millis(50), sink.send_command(command("x"))).await;
        assert!(stalled.is_err());
        assert_eq!(sink.sent_count(), 0);

        let sink = MockCommandSink::new();
        sink.fail();
        let err = sink.send_command(command("y")).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
