// ============================================
// File: crates/luminous-server/src/handlers/stream.rs
// ============================================
//! # Stream Handler
//!
//! ## Creation Reason
//! Each connected node keeps one bidirectional stream open. Something has
//! to apply what the node reports and feed it the commands queued for it,
//! and both directions have to stop together.
//!
//! ## Main Functionality
//! - `StreamHandler::handle_stream`: runs the receive and send loops
//! - `StreamHandler::send_command`: bounded enqueue with a timeout
//! - `StreamHandler::close`: idempotent shutdown of both loops
//!
//! ## State Machine
//! ```text
//!                 ┌──────────┐
//!   new() ──────► │  Active  │
//!                 └────┬─────┘
//!      receive error   │   send error   close()   node ends stream
//!            └─────────┼───────┴───────────┴──────────┘
//!                      ▼
//!                 ┌──────────┐
//!                 │  Closed  │ (terminal)
//!                 └──────────┘
//! ```
//!
//! ## Backpressure
//! ```text
//! send_command ──► [ queue: capacity N ] ──► send loop ──► CommandSink
//!       │                                        │
//!       │                          waits on sink.ready() before
//!       │                          taking the next command
//!       │
//!       └─ queue full for longer than the send timeout ──► QueueFull
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The `done` watch channel is the only cancellation primitive.
//!   Everything that stops the handler goes through `close()`.
//! - A bad status update is logged and skipped. Only transport failures
//!   end the stream.
//! - `handle_stream` can run once per handler; the queue receiver is
//!   taken on entry.
//!
//! ## Last Modified
//! v0.1.0 - Initial stream handler

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use luminous_common::NodeId;
use luminous_core::protocol::{ControlPlaneCommand, NodeStatusUpdate};
use luminous_transport::{CommandSink, StatusSource};

use crate::error::{Result, ServerError};
use crate::metrics::{MetricsSink, ResourceSample, TaskSample};
use crate::services::NodeRegistry;

/// Resource names projected onto the resource gauges.
const RESOURCE_CPU: &str = "CPU";
const RESOURCE_MEMORY: &str = "Memory";
const RESOURCE_DISK: &str = "Disk";

/// Metric report names projected onto the task series.
const METRIC_ACTIVE_TASKS: &str = "node_active_tasks";
const METRIC_COMPLETED_TASKS: &str = "node_completed_tasks_total";
const METRIC_FAILED_TASKS: &str = "node_failed_tasks_total";

// ============================================
// StreamHandler
// ============================================

/// Protocol engine for one node's stream.
pub struct StreamHandler {
    node_id: NodeId,
    registry: Arc<NodeRegistry>,
    metrics: Arc<dyn MetricsSink>,
    commands_tx: mpsc::Sender<ControlPlaneCommand>,
    commands_rx: Mutex<Option<mpsc::Receiver<ControlPlaneCommand>>>,
    done: watch::Sender<bool>,
    send_timeout: Duration,
}

impl StreamHandler {
    /// Creates an active handler with an empty command queue.
    ///
    /// `queue_capacity` must be non-zero (config validation enforces it).
    #[must_use]
    pub fn new(
        node_id: NodeId,
        registry: Arc<NodeRegistry>,
        metrics: Arc<dyn MetricsSink>,
        queue_capacity: usize,
        send_timeout: Duration,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(queue_capacity.max(1));
        let (done, _) = watch::channel(false);

        Self {
            node_id,
            registry,
            metrics,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
            done,
            send_timeout,
        }
    }

    /// Returns the node this handler serves.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Returns `true` once the handler reached its terminal state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.done.borrow()
    }

    /// Stops both loops. Safe to call any number of times.
    pub fn close(&self) {
        let was_closed = self.done.send_replace(true);
        if !was_closed {
            debug!(node_id = %self.node_id, "Stream handler closed");
        }
    }

    // ========================================
    // Stream Loops
    // ========================================

    /// Runs the stream until it ends, fails, or the handler is closed.
    ///
    /// # Returns
    /// `Ok(())` when the node ends the stream or `close()` is called.
    ///
    /// # Errors
    /// - The receive or send failure that ended the stream
    /// - `StreamClosed` if the handler already ran
    pub async fn handle_stream<S, K>(&self, mut source: S, sink: K) -> Result<()>
    where
        S: StatusSource,
        K: CommandSink,
    {
        let Some(mut commands_rx) = self.commands_rx.lock().take() else {
            return Err(self.stream_closed());
        };

        info!(node_id = %self.node_id, "Stream opened");

        let mut done = self.done.subscribe();
        let result = tokio::select! {
            result = self.receive_loop(&mut source) => result,
            result = self.send_loop(&mut commands_rx, &sink) => result,
            _ = done.wait_for(|closed| *closed) => Ok(()),
        };

        self.close();
        match &result {
            Ok(()) => info!(node_id = %self.node_id, "Stream ended"),
            Err(e) => warn!(node_id = %self.node_id, error = %e, "Stream failed"),
        }
        result
    }

    async fn receive_loop<S: StatusSource>(&self, source: &mut S) -> Result<()> {
        loop {
            match source.next_update().await {
                Ok(Some(update)) => self.handle_status_update(update),
                Ok(None) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn send_loop<K: CommandSink>(
        &self,
        commands_rx: &mut mpsc::Receiver<ControlPlaneCommand>,
        sink: &K,
    ) -> Result<()> {
        loop {
            // Leave commands queued while the node is not reading
            sink.ready().await?;
            let Some(command) = commands_rx.recv().await else {
                break;
            };
            let command_id = command.command_id.clone();
            sink.send_command(command).await?;
            debug!(node_id = %self.node_id, command_id = %command_id, "Command delivered");
        }
        Ok(())
    }

    // ========================================
    // Commands
    // ========================================

    /// Queues a command for delivery to the node.
    ///
    /// Waits up to the send timeout for room in the queue.
    ///
    /// # Errors
    /// - `QueueFull` if no room frees up in time
    /// - `StreamClosed` if the handler is closed
    pub async fn send_command(&self, command: ControlPlaneCommand) -> Result<()> {
        let mut done = self.done.subscribe();

        tokio::select! {
            sent = self.commands_tx.send_timeout(command, self.send_timeout) => match sent {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!(node_id = %self.node_id, "Command queue full");
                    Err(ServerError::QueueFull {
                        node_id: self.node_id.to_string(),
                        timeout_ms: u64::try_from(self.send_timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                }
                Err(SendTimeoutError::Closed(_)) => Err(self.stream_closed()),
            },
            _ = done.wait_for(|closed| *closed) => Err(self.stream_closed()),
        }
    }

    fn stream_closed(&self) -> ServerError {
        ServerError::StreamClosed {
            node_id: self.node_id.to_string(),
        }
    }

    // ========================================
    // Status Updates
    // ========================================

    /// Applies one status update. Failures are logged, never returned.
    pub fn handle_status_update(&self, update: NodeStatusUpdate) {
        if let Err(e) = self.apply_status_update(update) {
            warn!(node_id = %self.node_id, error = %e, "Failed to handle status update");
        }
    }

    fn apply_status_update(&self, update: NodeStatusUpdate) -> Result<()> {
        let node_id = self.node_id.as_str();

        let mut resources = ResourceSample::default();
        let hostname = match update.status {
            Some(status) => {
                let state = status.state();
                for usage in &status.resources {
                    match usage.name.as_str() {
                        RESOURCE_CPU => resources.cpu = Some(usage.usage_percentage),
                        RESOURCE_MEMORY => resources.memory = Some(usage.usage_percentage),
                        RESOURCE_DISK => resources.disk = Some(usage.usage_percentage),
                        _ => {}
                    }
                }

                let hostname = self.registry.update_node_status(node_id, status)?;
                self.metrics
                    .update_node_status(node_id, &hostname, state.as_str_name());
                hostname
            }
            None => self
                .registry
                .get_node(node_id)
                .map(|node| node.basic_info.hostname)
                .ok_or_else(|| ServerError::node_not_found(node_id))?,
        };

        if !resources.is_empty() {
            self.metrics
                .update_node_resources(node_id, &hostname, &resources);
        }

        let mut tasks = TaskSample::default();
        for report in &update.metrics {
            match report.metric_name.as_str() {
                METRIC_ACTIVE_TASKS => tasks.active = Some(report.value),
                METRIC_COMPLETED_TASKS => tasks.completed = counter_value(report.value),
                METRIC_FAILED_TASKS => tasks.failed = counter_value(report.value),
                _ => {}
            }
        }
        if !tasks.is_empty() {
            self.metrics.update_node_tasks(node_id, &hostname, &tasks);
        }

        Ok(())
    }
}

/// Converts a reported counter increment, dropping negative or non-finite values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn counter_value(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

impl Drop for StreamHandler {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandler")
            .field("node_id", &self.node_id)
            .field("closed", &self.is_closed())
            .field("queued", &(self.commands_tx.max_capacity() - self.commands_tx.capacity()))
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricEvent, RecordingMetrics};
    use luminous_core::protocol::{MetricReport, NodeBasicInfo, NodeState, NodeStatus, ResourceUsage};
    use crate::grpc::service::RESPONSE_BUFFER;
    use luminous_transport::{CommandSender, MockCommandSink, MockStatusSource};
    use tokio::time::timeout;

    const NODE: &str = "node-a";

    fn setup(capacity: usize, send_timeout: Duration) -> (Arc<StreamHandler>, Arc<NodeRegistry>, Arc<RecordingMetrics>) {
        let registry = Arc::new(NodeRegistry::new(Duration::from_secs(60)));
        registry.register_node(
            NodeId::parse(NODE).unwrap(),
            NodeBasicInfo {
                hostname: "worker-1".into(),
                ..Default::default()
            },
        );
        let metrics = Arc::new(RecordingMetrics::new());
        let handler = Arc::new(StreamHandler::new(
            NodeId::parse(NODE).unwrap(),
            Arc::clone(&registry),
            Arc::clone(&metrics) as Arc<dyn MetricsSink>,
            capacity,
            send_timeout,
        ));
        (handler, registry, metrics)
    }

    fn command(id: usize) -> ControlPlaneCommand {
        ControlPlaneCommand {
            command_id: format!("cmd-{id}"),
            ..Default::default()
        }
    }

    fn running_update() -> NodeStatusUpdate {
        NodeStatusUpdate {
            status: Some(NodeStatus {
                state: NodeState::Running as i32,
                resources: vec![
                    ResourceUsage { name: "CPU".into(), usage_percentage: 42.5 },
                    ResourceUsage { name: "Disk".into(), usage_percentage: 10.0 },
                    ResourceUsage { name: "GPU".into(), usage_percentage: 99.0 },
                ],
                ..Default::default()
            }),
            metrics: vec![
                MetricReport { metric_name: "node_active_tasks".into(), value: 3.0, ..Default::default() },
                MetricReport { metric_name: "node_failed_tasks_total".into(), value: 1.0, ..Default::default() },
                MetricReport { metric_name: "something_else".into(), value: 7.0, ..Default::default() },
            ],
        }
    }

    #[test]
    fn test_status_update_projects_metrics() {
        let (handler, registry, metrics) = setup(8, Duration::from_secs(1));

        handler.handle_status_update(running_update());

        assert_eq!(registry.get_node(NODE).unwrap().state(), NodeState::Running);
        assert_eq!(
            metrics.events(),
            vec![
                MetricEvent::Status {
                    node_id: NODE.into(),
                    hostname: "worker-1".into(),
                    state: "NODE_STATE_RUNNING".into(),
                },
                MetricEvent::Resources {
                    node_id: NODE.into(),
                    sample: ResourceSample { cpu: Some(42.5), memory: None, disk: Some(10.0) },
                },
                MetricEvent::Tasks {
                    node_id: NODE.into(),
                    sample: TaskSample { active: Some(3.0), completed: None, failed: Some(1) },
                },
            ]
        );
    }

    #[test]
    fn test_unknown_names_only_is_quiet() {
        let (handler, _, metrics) = setup(8, Duration::from_secs(1));

        handler.handle_status_update(NodeStatusUpdate {
            status: None,
            metrics: vec![MetricReport { metric_name: "gpu_temp".into(), value: 70.0, ..Default::default() }],
        });

        assert!(metrics.events().is_empty());
    }

    #[test]
    fn test_update_for_removed_node_is_logged_not_fatal() {
        let (handler, registry, metrics) = setup(8, Duration::from_secs(1));
        registry.remove_node(NODE);

        handler.handle_status_update(running_update());

        assert!(metrics.events().is_empty());
        assert!(!handler.is_closed());
    }

    #[test]
    fn test_counter_value() {
        assert_eq!(counter_value(5.9), Some(5));
        assert_eq!(counter_value(-1.0), None);
        assert_eq!(counter_value(f64::NAN), None);
    }

    #[tokio::test]
    async fn test_queue_full_after_capacity() {
        let (handler, _, _) = setup(100, Duration::from_millis(100));

        // No send loop is draining the queue
        for i in 0..100 {
            handler.send_command(command(i)).await.unwrap();
        }

        let started = tokio::time::Instant::now();
        let err = handler.send_command(command(100)).await.unwrap_err();
        assert!(matches!(err, ServerError::QueueFull { timeout_ms: 100, .. }));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_stalled_sink_hits_queue_full() {
        let (handler, _, _) = setup(100, Duration::from_millis(100));
        let (source, _feed) = MockStatusSource::new();
        let sink = MockCommandSink::new();
        sink.stall();

        let runner = Arc::clone(&handler);
        let task = tokio::spawn(async move { runner.handle_stream(source, sink).await });

        let mut failed_at = None;
        for i in 0..105 {
            if handler.send_command(command(i)).await.is_err() {
                failed_at = Some(i);
                break;
            }
        }
        // One command may sit inside the stalled sink rather than the queue
        let failed_at = failed_at.unwrap();
        assert!((100..=101).contains(&failed_at));

        handler.close();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unread_response_channel_bounds_accepted_commands() {
        let (handler, _, _) = setup(100, Duration::from_millis(100));
        let (source, _feed) = MockStatusSource::new();
        let (sink, _unread): (CommandSender, _) = mpsc::channel(RESPONSE_BUFFER);

        let runner = Arc::clone(&handler);
        let task = tokio::spawn(async move { runner.handle_stream(source, sink).await });

        let mut accepted = 0;
        for i in 0..250 {
            if handler.send_command(command(i)).await.is_err() {
                break;
            }
            accepted += 1;
        }
        assert!((100..=101).contains(&accepted), "accepted {accepted}");

        handler.close();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stream_delivers_commands_and_applies_updates() {
        let (handler, registry, _) = setup(8, Duration::from_secs(1));
        let (source, feed) = MockStatusSource::new();
        let sink = MockCommandSink::new();

        let runner = Arc::clone(&handler);
        let task_sink = sink.clone();
        let task = tokio::spawn(async move { runner.handle_stream(source, task_sink).await });

        handler.send_command(command(1)).await.unwrap();
        handler.send_command(command(2)).await.unwrap();
        let sent = timeout(Duration::from_secs(1), sink.wait_for(2)).await.unwrap();
        assert_eq!(sent[0].command_id, "cmd-1");
        assert_eq!(sent[1].command_id, "cmd-2");

        feed.push(running_update());
        feed.finish();

        timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();
        assert!(handler.is_closed());
        assert_eq!(registry.get_node(NODE).unwrap().state(), NodeState::Running);
    }

    #[tokio::test]
    async fn test_receive_error_closes_handler() {
        let (handler, _, _) = setup(8, Duration::from_secs(1));
        let (source, feed) = MockStatusSource::new();
        feed.fail("connection reset");

        let err = handler
            .handle_stream(source, MockCommandSink::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Transport(_)));
        assert!(handler.is_closed());
        assert!(matches!(
            handler.send_command(command(1)).await,
            Err(ServerError::StreamClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_error_closes_handler() {
        let (handler, _, _) = setup(8, Duration::from_secs(1));
        let (source, _feed) = MockStatusSource::new();
        let sink = MockCommandSink::new();
        sink.fail();

        handler.send_command(command(1)).await.unwrap();
        let result = timeout(Duration::from_secs(1), handler.handle_stream(source, sink))
            .await
            .unwrap();

        assert!(result.is_err());
        assert!(handler.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_stream() {
        let (handler, _, _) = setup(8, Duration::from_secs(1));
        let (source, _feed) = MockStatusSource::new();

        let runner = Arc::clone(&handler);
        let task = tokio::spawn(async move { runner.handle_stream(source, MockCommandSink::new()).await });

        tokio::task::yield_now().await;
        handler.close();
        handler.close();

        timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();

        // A second run is refused
        let (source, _feed) = MockStatusSource::new();
        assert!(handler.handle_stream(source, MockCommandSink::new()).await.is_err());
    }
}
